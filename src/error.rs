
use std::error::Error;
use std::fmt::{self, Display, Debug};
use std::path::PathBuf;

pub trait ErrorDescription {
    fn description(&self) -> impl Display;
    fn code(&self) -> Option<i32> {
        None
    }
    fn error_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl<T> ErrorDescription for T
where
    T: Display,
{
    fn description(&self) -> impl Display {
        self
    }
}

pub struct GenericError<T>(pub T) where T: ErrorDescription;

impl<T> GenericError<T>
where
    T: ErrorDescription,
{
    pub const fn new(err: T) -> Self {
        Self(err)
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn as_inner(&self) -> &T {
        &self.0
    }

    pub fn error_name(&self) -> &'static str {
        self.0.error_name()
    }

    pub fn code(&self) -> Option<i32> {
        self.0.code()
    }
}

impl<T> Debug for GenericError<T>
where
    T: ErrorDescription,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(code) = self.0.code() {
            write!(f, "GenericError({}): {} ({})", self.error_name(), self.0.description(), code)
        } else {
            write!(f, "GenericError({}): {}", self.error_name(), self.0.description())
        }
    }
}

impl<T> Display for GenericError<T>
where
    T: ErrorDescription,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.description())
    }
}

impl<T> Error for GenericError<T>
where
    T: ErrorDescription,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl<T> From<T> for GenericError<T>
where
    T: ErrorDescription,
{
    fn from(err: T) -> Self {
        Self::new(err)
    }
}

/// Everything that can go wrong between reading a screenplay and writing its audio.
#[non_exhaustive]
#[derive(Debug)]
pub enum ScreenplayErrorDescription {
    /// A screenplay or config file could not be read.
    Read { path: PathBuf, source: std::io::Error },
    /// An output file or directory could not be written.
    Write { path: PathBuf, source: std::io::Error },
    InputNotFound(PathBuf),
    NotATextFile(PathBuf),
    NoScreenplays(PathBuf),
    /// Two screenplays in one batch would write to the same output.
    DuplicateOutput(PathBuf),
    VoiceConfig { path: PathBuf, reason: String },
    VoiceNotFound(String),
    NoVoicesLoaded,
    Synthesis(String),
    Wav(hound::Error),
    Resample(String),
}

impl ErrorDescription for ScreenplayErrorDescription {
    #[allow(refining_impl_trait)]
    fn description(&self) -> String {
        match self {
            Self::Read { path, source } => format!("Failed to read {}: {}", path.display(), source),
            Self::Write { path, source } => format!("Failed to write {}: {}", path.display(), source),
            Self::InputNotFound(path) => format!("Path not found: {}", path.display()),
            Self::NotATextFile(path) => format!("Not a .txt file: {}", path.display()),
            Self::NoScreenplays(path) => format!("No .txt files found in {}", path.display()),
            Self::DuplicateOutput(path) => format!("Output {} is already used by another screenplay", path.display()),
            Self::VoiceConfig { path, reason } => format!("Invalid voice config {}: {}", path.display(), reason),
            Self::VoiceNotFound(voice) => format!("Voice model not found: {}", voice),
            Self::NoVoicesLoaded => "No valid voice models loaded. Check the voice paths in the voice config".to_string(),
            Self::Synthesis(msg) => format!("Synthesis failed: {}", msg),
            Self::Wav(err) => format!("WAV error: {}", err),
            Self::Resample(msg) => format!("Resampling failed: {}", msg),
        }
    }

    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Wav(err) => Some(err),
            _ => None,
        }
    }
}

pub type ScreenplayError = GenericError<ScreenplayErrorDescription>;

impl From<hound::Error> for ScreenplayError {
    fn from(err: hound::Error) -> Self {
        Self::new(ScreenplayErrorDescription::Wav(err))
    }
}

impl ScreenplayError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::new(ScreenplayErrorDescription::Read { path: path.into(), source })
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::new(ScreenplayErrorDescription::Write { path: path.into(), source })
    }

    pub(crate) fn synthesis(msg: impl Into<String>) -> Self {
        Self::new(ScreenplayErrorDescription::Synthesis(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_keeps_path_and_source() {
        let err = ScreenplayError::read("act1.txt", std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "Failed to read act1.txt: gone");
        assert!(Error::source(&err).is_some());
    }

    #[test]
    fn debug_names_the_description_type() {
        let err = ScreenplayError::new(ScreenplayErrorDescription::NoVoicesLoaded);
        assert!(format!("{:?}", err).contains("ScreenplayErrorDescription"));
    }
}
