//! X11 backend: RECORD extension for capture, XTEST for injection.
//!
//! Both halves open their own connections to `$DISPLAY`. Capture needs two:
//! RECORD delivers intercepted events as a never-ending reply on the data
//! connection, so the context has to be created and disabled from a second
//! (control) connection.

mod capture;
mod executor;

pub use capture::X11Capture;
pub use executor::X11Executor;

use std::fmt;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::xproto::{ConnectionExt as _, Window};
use x11rb::rust_connection::RustConnection;

use crate::platform::{PlatformError, Point};

/// A connection plus the root window of its default screen.
pub(super) struct Display {
    pub conn: RustConnection,
    pub root: Window,
}

impl Display {
    /// Connects to `$DISPLAY` and checks that `extension` is present.
    pub fn open(extension: &'static str) -> Result<Self, PlatformError> {
        let (conn, screen) = x11rb::connect(None)
            .map_err(|e| PlatformError::Unavailable(format!("cannot connect to X server: {e}")))?;
        let root = conn
            .setup()
            .roots
            .get(screen)
            .map(|s| s.root)
            .ok_or_else(|| PlatformError::Other(format!("X screen {screen} not found")))?;

        if conn.extension_information(extension).map_err(x11)?.is_none() {
            return Err(PlatformError::Unavailable(format!(
                "X server lacks the {extension} extension"
            )));
        }
        Ok(Self { conn, root })
    }

    pub fn pointer(&self) -> Result<Point, PlatformError> {
        let reply = self.conn.query_pointer(self.root).map_err(x11)?.reply().map_err(x11)?;
        Ok(Point::new(reply.root_x.into(), reply.root_y.into()))
    }
}

/// Round trip to the server: every request sent before has been processed.
pub(super) fn sync(conn: &RustConnection) -> Result<(), PlatformError> {
    conn.get_input_focus().map_err(x11)?.reply().map_err(x11)?;
    Ok(())
}

pub(super) fn x11(e: impl fmt::Display) -> PlatformError {
    PlatformError::Other(format!("X11: {e}"))
}

/// X11 coordinates are 16-bit; larger values are clamped.
pub(super) fn coord(v: i32) -> i16 {
    v.clamp(i16::MIN.into(), i16::MAX.into()) as i16
}
