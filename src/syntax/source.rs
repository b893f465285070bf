use std::{
	fs::File,
	io::Read,
	path::Path,
};


/// A source file loaded into memory.
#[derive(Debug)]
pub struct Source {
	pub path: Box<Path>,
	pub contents: Box<[u8]>,
}


impl Source {
	/// Load the source code from a file path.
	pub fn from_path<P>(path: P) -> std::io::Result<Self>
	where
		P: Into<Box<Path>>,
	{
		let path = path.into();
		let mut file = File::open(&path)?;

		let mut contents = Vec::with_capacity(512);
		file.read_to_end(&mut contents)?;

		Ok(
			Self {
				path,
				contents: contents.into(),
			}
		)
	}
}
