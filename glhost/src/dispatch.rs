//! The run loop: pumps native messages and hands the translated events to a handler.

use crate::event::{Event, KeyCode, Translator};
use crate::os::window::WindowId;
use crate::{Error, Host, Result};
use log::{debug, info};

/// Where a window's run loop is at.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum RunState {
    /// `run_window` was never entered.
    Idle,
    Pumping,
    /// A run loop ran and returned. The window may be run again.
    Stopped,
}

/// Handed to the handler for every event. Gives access to the host and to the window being pumped.
pub struct LoopContext<'h> {
    host: &'h Host,
    window: WindowId,
    exit_requested: bool,
}

impl<'h> LoopContext<'h> {
    fn new(host: &'h Host, window: WindowId) -> Self {
        Self {
            host,
            window,
            exit_requested: false,
        }
    }

    pub fn host(&self) -> &'h Host {
        self.host
    }

    /// The window this loop is pumping.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Leave the run loop once the current handler returns. The window stays open.
    pub fn exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Destroy the pumped window, which also ends the run loop.
    pub fn destroy_window(&mut self) -> Result<()> {
        self.host.destroy_window(self.window)
    }

    pub fn swap_buffers(&self) -> Result<()> {
        self.host.swap_buffers(self.window)
    }

    pub fn make_current(&self) -> Result<()> {
        self.host.make_current(self.window)
    }

    pub fn latest_downed_key(&self) -> Result<Option<KeyCode>> {
        self.host.latest_downed_key(self.window)
    }

    pub fn latest_upped_key(&self) -> Result<Option<KeyCode>> {
        self.host.latest_upped_key(self.window)
    }
}

type Callback<'a> = Box<dyn FnMut(&mut LoopContext<'_>) -> anyhow::Result<()> + 'a>;
type KeyCallback<'a> = Box<dyn FnMut(&mut LoopContext<'_>, KeyCode) -> anyhow::Result<()> + 'a>;

/// One optional handler per event category, for [`Host::run_window_with`].
///
/// Registering a category twice replaces the first handler. Events without a handler are dropped.
#[derive(Default)]
pub struct Handlers<'a> {
    redraw_requested: Option<Callback<'a>>,
    key_down: Option<KeyCallback<'a>>,
    key_up: Option<KeyCallback<'a>>,
    close_requested: Option<Callback<'a>>,
}

impl<'a> Handlers<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_redraw_requested(
        mut self,
        f: impl FnMut(&mut LoopContext<'_>) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.redraw_requested = Some(Box::new(f));
        self
    }

    pub fn on_key_down(
        mut self,
        f: impl FnMut(&mut LoopContext<'_>, KeyCode) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.key_down = Some(Box::new(f));
        self
    }

    pub fn on_key_up(
        mut self,
        f: impl FnMut(&mut LoopContext<'_>, KeyCode) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.key_up = Some(Box::new(f));
        self
    }

    pub fn on_close_requested(
        mut self,
        f: impl FnMut(&mut LoopContext<'_>) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.close_requested = Some(Box::new(f));
        self
    }

    /// Route one event to its category handler.
    pub fn dispatch(&mut self, ctx: &mut LoopContext<'_>, event: Event) -> anyhow::Result<()> {
        match event {
            Event::RedrawRequested => match &mut self.redraw_requested {
                Some(f) => f(ctx),
                None => Ok(()),
            },
            Event::KeyDown(key) => match &mut self.key_down {
                Some(f) => f(ctx, key),
                None => Ok(()),
            },
            Event::KeyUp(key) => match &mut self.key_up {
                Some(f) => f(ctx, key),
                None => Ok(()),
            },
            Event::CloseRequested => match &mut self.close_requested {
                Some(f) => f(ctx),
                None => Ok(()),
            },
        }
    }
}

/// Puts the window back to `Stopped` however the loop is left, unwinding included.
struct PumpGuard<'h> {
    host: &'h Host,
    window: WindowId,
}

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut window_manager) = self.host.window_manager.try_borrow_mut() {
            if let Some(record) = window_manager.get_mut(self.window) {
                record.run_state = RunState::Stopped;
            }
        }
        info!("Run loop for window {} stopped", self.window);
    }
}

impl Host {
    /// Pump native messages for `id` and call `handler` for every event, in arrival order, on this
    /// thread.
    ///
    /// Returns once the handler calls [`LoopContext::exit`] or destroys the window. An error from the
    /// handler ends the loop and is returned as [`Error::Handler`]. `CloseRequested` does not end the
    /// loop by itself.
    pub fn run_window<F>(&self, id: WindowId, mut handler: F) -> Result<()>
    where
        F: FnMut(&mut LoopContext<'_>, Event) -> anyhow::Result<()>,
    {
        {
            let mut window_manager = self.window_manager.borrow_mut();
            if window_manager.any_pumping() {
                return Err(Error::ReentrantRunLoop(id));
            }
            let record = window_manager
                .get_mut(id)
                .ok_or(Error::InvalidWindow(id))?;
            record.run_state = RunState::Pumping;
        }

        let _guard = PumpGuard { host: self, window: id };
        info!("Run loop for window {} started", id);

        let mut ctx = LoopContext::new(self, id);
        let mut native = Vec::new();

        'pump: loop {
            native.clear();
            self.platform
                .pump_events(&mut native)
                .map_err(Error::platform)?;

            let mut translator = Translator::default();

            for message in &native {
                let event = self
                    .window_manager
                    .borrow_mut()
                    .translate(message, id, &mut translator);
                let Some(event) = event else {
                    continue;
                };

                handler(&mut ctx, event).map_err(Error::Handler)?;

                if ctx.exit_requested() {
                    debug!("Handler asked window {} to leave its run loop", id);
                    break 'pump;
                }

                if !self.is_window_alive(id) {
                    break 'pump;
                }
            }

            if !self.is_window_alive(id) {
                break;
            }
        }

        Ok(())
    }

    /// [`Host::run_window`] with one handler per event category.
    pub fn run_window_with(&self, id: WindowId, handlers: &mut Handlers<'_>) -> Result<()> {
        self.run_window(id, |ctx, event| handlers.dispatch(ctx, event))
    }

    pub fn run_state(&self, id: WindowId) -> Result<RunState> {
        self.window_manager
            .borrow()
            .get(id)
            .map(|w| w.run_state)
            .ok_or(Error::InvalidWindow(id))
    }
}
