//! Replay-last broadcast cells shared between producers and the render loop.
//!
//! Each surface is an explicitly constructed value; whoever composes the
//! application creates one of each and hands `Rc` clones to the audio pump, the
//! player UI and every engine instance.

mod audio;
mod broadcast;
mod media;
mod visual;

pub use audio::AudioSurface;
pub use broadcast::{Broadcast, Subscription};
pub use media::{MediaEvent, MediaSurface, PlaybackStatus};
pub use visual::{CanvasRegistration, CanvasSlot, VisualSurface};
