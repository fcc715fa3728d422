//! Process-level error type.
//!
//! Every fallible operation in the crate returns `AppError`. The exit code
//! groups failures the way the CLI reports them:
//!
//! - `2`: invalid input (bad arguments, malformed snapshot, cap exceeded)
//! - `3`: geometry/head-model problems (missing coils, balancing mismatch)
//! - `4`: fit/export failures (I/O during export, non-finite results)

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Invalid user input or snapshot contents (exit code 2).
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// Sensor-geometry / head-model problem (exit code 3).
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    /// Fit or export failure (exit code 4).
    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(4, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
