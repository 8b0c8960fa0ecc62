//! Scriptable media resource for tests.
//!
//! [`FakeMediaResource`] records every command the session issues and never
//! produces signals on its own. Tests build signals for the load they want to
//! resolve (usually [`FakeMediaResource::last_load`]) and feed them to the
//! session, which makes late and out-of-order delivery easy to simulate.

use bridge_traits::{
    error::Result as BridgeResult, BridgeError, LoadId, MediaEvent, MediaResource, MediaSignal,
    MediaSource,
};

/// A command received by [`FakeMediaResource`].
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    Load(LoadId, String),
    Play,
    Pause,
    SeekTo(f64),
    Unload,
}

#[derive(Debug, Default)]
pub struct FakeMediaResource {
    bound: Option<MediaSource>,
    last_load: Option<LoadId>,
    commands: Vec<MediaCommand>,
    fail_next_load: Option<String>,
    fail_next_play: Option<String>,
}

impl FakeMediaResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command issued so far, oldest first.
    pub fn commands(&self) -> &[MediaCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn count(&self, matches: impl Fn(&MediaCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| matches(c)).count()
    }

    /// Load id passed to the most recent `load` call.
    pub fn last_load(&self) -> Option<LoadId> {
        self.last_load
    }

    /// Make the next `load` fail synchronously with `message`.
    pub fn fail_next_load(&mut self, message: impl Into<String>) {
        self.fail_next_load = Some(message.into());
    }

    /// Make the next `play` fail synchronously with `message`.
    pub fn fail_next_play(&mut self, message: impl Into<String>) {
        self.fail_next_play = Some(message.into());
    }

    fn signal(&self, event: MediaEvent) -> MediaSignal {
        MediaSignal::new(self.last_load.unwrap_or(LoadId(0)), event)
    }

    pub fn ready(&self, duration_seconds: f64) -> MediaSignal {
        self.signal(MediaEvent::Ready { duration_seconds })
    }

    pub fn error(&self, message: &str) -> MediaSignal {
        self.signal(MediaEvent::Error {
            message: message.to_string(),
        })
    }

    /// The resource reporting that it started playing on its own.
    pub fn playing(&self) -> MediaSignal {
        self.signal(MediaEvent::Play)
    }

    pub fn time_update(&self, position_seconds: f64) -> MediaSignal {
        self.signal(MediaEvent::TimeUpdate { position_seconds })
    }

    pub fn ended(&self) -> MediaSignal {
        self.signal(MediaEvent::Ended)
    }
}

impl MediaResource for FakeMediaResource {
    fn load(&mut self, load: LoadId, source: &MediaSource) -> BridgeResult<()> {
        self.commands
            .push(MediaCommand::Load(load, source.key().to_string()));
        if let Some(message) = self.fail_next_load.take() {
            self.bound = None;
            return Err(BridgeError::Media(message));
        }
        self.bound = Some(source.clone());
        self.last_load = Some(load);
        Ok(())
    }

    fn play(&mut self) -> BridgeResult<()> {
        self.commands.push(MediaCommand::Play);
        match self.fail_next_play.take() {
            Some(message) => Err(BridgeError::Media(message)),
            None => Ok(()),
        }
    }

    fn pause(&mut self) -> BridgeResult<()> {
        self.commands.push(MediaCommand::Pause);
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> BridgeResult<()> {
        self.commands.push(MediaCommand::SeekTo(seconds));
        Ok(())
    }

    fn unload(&mut self) {
        self.commands.push(MediaCommand::Unload);
        self.bound = None;
    }

    fn bound_source(&self) -> Option<&MediaSource> {
        self.bound.as_ref()
    }
}
