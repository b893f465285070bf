use std::{
	fmt::{self, Display},
	io,
};

pub use termion::color::{Green, Red};


thread_local! {
	static IS_TTY: bool = termion::is_tty(&io::stdout())
		&& termion::is_tty(&io::stderr());
}


/// Paint the foreground with a given color when formatting the value.
/// The color codes are omitted when not writing to a terminal.
pub struct Fg<C, T>(pub C, pub T);


impl<C, T> Display for Fg<C, T>
where
	C: termion::color::Color + Copy,
	T: Display,
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		IS_TTY.with(
			|&is_tty| if is_tty {
				write!(f, "{}", termion::color::Fg(self.0))?;
				self.1.fmt(f)?;
				write!(f, "{}", termion::color::Fg(termion::color::Reset))
			} else {
				self.1.fmt(f)
			}
		)
	}
}
