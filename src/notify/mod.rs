//! Transient, non-blocking user notifications.
//!
//! A notification is shown with an optional lifetime, counts down, and is
//! removed after a short exit animation. Timed notifications that are still
//! showing when the page navigates away are persisted with their remaining
//! lifetime and restored on the next page, so a message shown just before a
//! redirect is not lost. Confirmation dialogs live here too but never persist.

mod center;
mod dialog;
mod notification;
mod surface;

pub use center::{NotificationCenter, EXIT_ANIMATION_MS};
pub use dialog::{Confirmation, DialogAction};
pub use notification::{
  Notification, NotificationId, NotificationKind, NotificationState, PendingNotification,
};
pub use surface::{Entrance, Surface, TracingSurface};
