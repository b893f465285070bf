use super::Source;


/// A byte cursor over the source code. The automaton peeks the current byte
/// and only steps past it once a transition consumes it, which is what lets
/// an accepting state revisit the byte that ended the previous token.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
	input: &'a [u8],
	offset: usize,
}


impl<'a> Cursor<'a> {
	pub fn offset(&self) -> usize {
		self.offset
	}


	pub fn is_eof(&self) -> bool {
		self.offset == self.input.len()
	}


	pub fn peek(&self) -> Option<u8> {
		self.input.get(self.offset).copied()
	}


	pub fn step(&mut self) {
		if !self.is_eof() {
			self.offset += 1;
		}
	}
}


impl<'a> From<&'a Source> for Cursor<'a> {
	fn from(source: &'a Source) -> Self {
		Self {
			input: &source.contents,
			offset: 0,
		}
	}
}


impl<'a> From<&'a [u8]> for Cursor<'a> {
	fn from(input: &'a [u8]) -> Self {
		Self { input, offset: 0 }
	}
}
