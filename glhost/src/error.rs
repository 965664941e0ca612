use crate::config::GlVersion;
use crate::os::window::WindowId;
use raw_window_handle::HandleError;

/// Errors reported by [`Host`](crate::Host) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The native window could not be allocated (windowing system unreachable, zero size, bad title).
    #[error("failed to create window: {0}")]
    WindowCreation(String),

    /// The driver refused to create a context of the requested version.
    #[error("failed to create an OpenGL {version} context: {reason}")]
    ContextCreation { version: GlVersion, reason: String },

    /// The window was destroyed or never existed.
    #[error("window {0} does not exist or has been destroyed")]
    InvalidWindow(WindowId),

    /// Buffer swap or swap-interval change while the window's context is not current on this thread.
    #[error("the OpenGL context of window {0} is not current on this thread")]
    NoCurrentContext(WindowId),

    /// `run_window` was entered while another run loop was already pumping.
    #[error("cannot run window {0}: a run loop is already pumping events on this host")]
    ReentrantRunLoop(WindowId),

    #[error("invalid window size {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// A native call failed on a live window.
    #[error("native platform call failed: {0}")]
    Platform(String),

    #[error(transparent)]
    Handle(#[from] HandleError),

    /// The event handler returned an error, which ended the run loop.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl Error {
    pub(crate) fn platform(error: anyhow::Error) -> Self {
        Error::Platform(format!("{error:#}"))
    }

    pub(crate) fn window_creation(error: anyhow::Error) -> Self {
        Error::WindowCreation(format!("{error:#}"))
    }

    pub(crate) fn context_creation(version: GlVersion, error: anyhow::Error) -> Self {
        Error::ContextCreation {
            version,
            reason: format!("{error:#}"),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
