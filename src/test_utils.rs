use std::path::{Path, PathBuf};

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing results to during testing
    ///
    /// Returns the struct `TempFixture` that contains the temp dir (for clean-up on `drop`)
    /// as well as the empty file path.
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Assert numerical difference between two expressions is less than
/// 64-bit machine epsilon or a specified epsilon.
///
/// ```text
/// assert_near!(stats.mean, 8.5);
/// assert_near!(stats.std_dev, 4.6097722, epsilon = 1e-6);
/// ```
#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr) => {
        $crate::assert_near!($left, $right, epsilon = f64::EPSILON)
    };
    ($left:expr, $right:expr, epsilon = $ep:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "|{} - {}| = {} is greater than epsilon {:.4e}",
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
}
