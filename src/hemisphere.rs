use std::fmt;
use std::str::FromStr;

use crate::error::FsPostError;

/// A brain hemisphere, named the FreeSurfer way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hemisphere {
    Lh,
    Rh,
}

impl Hemisphere {
    pub const BOTH: [Hemisphere; 2] = [Hemisphere::Lh, Hemisphere::Rh];

    /// The file name prefix, `lh` or `rh`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Hemisphere::Lh => "lh",
            Hemisphere::Rh => "rh",
        }
    }

    /// Guess the hemisphere from a FreeSurfer file name like `lh.thickness`.
    pub fn from_file_name(name: &str) -> Option<Hemisphere> {
        if name.starts_with("lh.") {
            Some(Hemisphere::Lh)
        } else if name.starts_with("rh.") {
            Some(Hemisphere::Rh)
        } else {
            None
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Hemisphere {
    type Err = FsPostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lh" => Ok(Hemisphere::Lh),
            "rh" => Ok(Hemisphere::Rh),
            other => Err(FsPostError::Config(format!("invalid hemisphere '{}'", other))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hemispheres_are_parsed() {
        assert_eq!(Hemisphere::Lh, "lh".parse::<Hemisphere>().unwrap());
        assert_eq!(Hemisphere::Rh, "rh".parse::<Hemisphere>().unwrap());
        assert!(matches!("left".parse::<Hemisphere>(), Err(FsPostError::Config(_))));
    }

    #[test]
    fn hemisphere_is_guessed_from_file_names() {
        assert_eq!(Some(Hemisphere::Rh), Hemisphere::from_file_name("rh.thickness"));
        assert_eq!(None, Hemisphere::from_file_name("thickness"));
        assert_eq!("lh", Hemisphere::Lh.to_string());
    }
}
