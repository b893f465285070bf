use std::{ffi::OsString, path::PathBuf};

use clap::{clap_app, crate_authors, crate_description, crate_version};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Help(Box<str>),
	Version(Box<str>),
	Run(Args),
}


#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Args {
	/// The source files to compile. Empty means the default input file.
	pub files: Vec<PathBuf>,
}


pub fn parse<A, T>(args: A) -> clap::Result<Command>
where
	A: IntoIterator<Item = T>,
	T: Into<OsString> + Clone,
{
	let app = clap_app!(
		minipas =>
			(version: crate_version!())
			(author: crate_authors!())
			(about: crate_description!())
			(@setting AllowLeadingHyphen)
			(@arg files: ... "Source files to compile; code.txt when omitted")
	);

	match app.get_matches_from_safe(args) {
		Ok(matches) => {
			// No flags are defined; anything that looks like one is
			// tolerated and skipped.
			let files = matches
				.values_of("files")
				.map(
					|values| values
						.filter(|value| !value.starts_with('-'))
						.map(PathBuf::from)
						.collect()
				)
				.unwrap_or_default();

			Ok(Command::Run(Args { files }))
		}

		Err(error) => match error.kind {
			clap::ErrorKind::HelpDisplayed => Ok(
				Command::Help(error.message.into_boxed_str())
			),
			clap::ErrorKind::VersionDisplayed => Ok(
				Command::Version(error.message.into_boxed_str())
			),
			_ => Err(error),
		}
	}
}
