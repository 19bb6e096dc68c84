use crate::common::error::VcsError;

/// vcsbatch全体で使用するResult型のエイリアス
pub type VcsResult<T> = Result<T, VcsError>;

/// 標準のResult型をVcsResultに変換するためのヘルパー
pub trait ResultExt<T, E> {
    /// ファイルシステムエラーとしてVcsResultに変換
    ///
    /// # Examples
    ///
    /// ```
    /// use vcsbatch::common::result::{VcsResult, ResultExt};
    ///
    /// let result: Result<(), std::io::Error> = Err(std::io::Error::new(
    ///     std::io::ErrorKind::NotFound, "missing"
    /// ));
    /// let converted: VcsResult<()> = result.with_filesystem_error("Failed to create", None);
    /// assert!(converted.is_err());
    /// ```
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> VcsResult<T>
    where
        E: Into<std::io::Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> VcsResult<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| VcsError::filesystem_error_with_source(message, path, e.into()))
    }
}
