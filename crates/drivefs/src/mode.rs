use crate::error::{Error, Result};

/// Parsed file open mode (`r`, `w`, `a`, `x` with optional `+`, `b`, `t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    base: char,
    update: bool,
    text: bool,
}

impl Mode {
    /// True if the handle may be read.
    pub fn reading(&self) -> bool {
        self.base == 'r' || self.update
    }

    /// True if the handle may be written.
    pub fn writing(&self) -> bool {
        self.base != 'r' || self.update
    }

    /// True if writes always land at the end of the content.
    pub fn appending(&self) -> bool {
        self.base == 'a'
    }

    /// True if existing content is discarded on open.
    pub fn truncate(&self) -> bool {
        self.base == 'w' || self.base == 'x'
    }

    /// True if opening must fail when the file already exists.
    pub fn exclusive(&self) -> bool {
        self.base == 'x'
    }

    /// True if a missing file is created.
    pub fn create(&self) -> bool {
        self.base != 'r'
    }

    pub fn binary(&self) -> bool {
        !self.text
    }
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let base = match chars.next() {
            Some(c @ ('r' | 'w' | 'a' | 'x')) => c,
            _ => return Err(Error::InvalidMode(s.to_string())),
        };
        let mut update = false;
        let mut binary = false;
        let mut text = false;
        for c in chars {
            match c {
                '+' if !update => update = true,
                'b' if !binary => binary = true,
                't' if !text => text = true,
                _ => return Err(Error::InvalidMode(s.to_string())),
            }
        }
        if binary && text {
            return Err(Error::InvalidMode(s.to_string()));
        }
        Ok(Mode { base, update, text })
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if self.update {
            write!(f, "+")?;
        }
        write!(f, "{}", if self.text { "t" } else { "b" })
    }
}
