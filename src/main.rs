use glhost::{Event, GlConfig, GlVersion, Host, KeyCode};
use log::{info, warn};
use std::mem;

type GlClearColor = extern "system" fn(f32, f32, f32, f32);
type GlClear = extern "system" fn(u32);

const GL_COLOR_BUFFER_BIT: u32 = 0x0000_4000;

/// `GLHOST_GL_VERSION=4.6` picks the context version, 3.3 otherwise.
fn requested_version() -> anyhow::Result<GlVersion> {
    match std::env::var("GLHOST_GL_VERSION") {
        Ok(value) => Ok(value.parse()?),
        Err(_) => Ok(GlVersion::V3_3),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let version = requested_version()?;
    let host = Host::new()?;
    info!("Platform: {}", host.platform().name());

    let window = host.create_window(800, 600, "glhost", GlConfig::new(version))?;
    host.make_current(window)?;

    let clear_color = host.get_proc_address(window, "glClearColor")?;
    let clear = host.get_proc_address(window, "glClear")?;
    if clear_color.is_null() || clear.is_null() {
        anyhow::bail!("the OpenGL {} context does not expose glClear", version);
    }
    let (clear_color, clear) = unsafe {
        (
            mem::transmute::<*const std::ffi::c_void, GlClearColor>(clear_color),
            mem::transmute::<*const std::ffi::c_void, GlClear>(clear),
        )
    };

    if let Err(e) = host.set_swap_interval(window, 1) {
        warn!("Running without vsync: {}", e);
    }

    host.show_window(window)?;

    let mut frame = 0u32;
    host.run_window(window, |ctx, event| {
        match event {
            Event::RedrawRequested => {
                let t = (frame % 120) as f32 / 120.0;
                clear_color(0.1, 0.2 + 0.3 * t, 0.4, 1.0);
                clear(GL_COLOR_BUFFER_BIT);
                ctx.swap_buffers()?;
                frame += 1;
            }
            Event::KeyDown(KeyCode::ESCAPE) | Event::CloseRequested => {
                info!("Closing after {} frames", frame);
                ctx.destroy_window()?;
            }
            Event::KeyDown(key) => info!("Key down: {:?} ({:?})", key, key.to_char()),
            Event::KeyUp(key) => info!("Key up: {:?}", key),
        }
        Ok(())
    })?;

    Ok(())
}
