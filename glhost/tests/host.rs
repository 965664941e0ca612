use glhost::os::sim::SimPlatform;
use glhost::{
    Error, GlConfig, GlVersion, Host, SizeState, Visibility, WindowAttributes, WindowPosition,
};
use std::sync::Arc;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn host() -> (Host, Arc<SimPlatform>) {
    init();
    let sim = SimPlatform::new();
    (Host::with_platform(sim.clone()), sim)
}

#[test]
fn test_size_after_create() {
    let (host, _) = host();
    let window = host
        .create_window(640, 480, "size", GlConfig::default())
        .unwrap();
    assert_eq!(host.size(window).unwrap(), (640, 480));
    assert_eq!(host.title(window).unwrap(), "size");
    assert_eq!(host.visibility(window).unwrap(), Visibility::Hidden);
    assert_eq!(host.gl_config(window).unwrap().version, GlVersion::V3_1);
}

#[test]
fn test_zero_size_is_rejected() {
    let (host, _) = host();
    let result = host.create_window(0, 480, "zero", GlConfig::default());
    assert!(matches!(result, Err(Error::WindowCreation(_))));

    let window = host.create_window(10, 10, "ok", GlConfig::default()).unwrap();
    assert!(matches!(
        host.set_size(window, 10, 0),
        Err(Error::InvalidGeometry { width: 10, height: 0 })
    ));
    assert_eq!(host.size(window).unwrap(), (10, 10));
}

#[test]
fn test_title_with_nul_is_rejected() {
    let (host, _) = host();
    let result = host.create_window(10, 10, "bad\0title", GlConfig::default());
    assert!(matches!(result, Err(Error::WindowCreation(_))));
}

#[test]
fn test_unsupported_version_fails_with_context_creation() {
    init();
    let sim = SimPlatform::with_max_gl_version(GlVersion::V4_1);
    let host = Host::with_platform(sim.clone());

    match host.create_window(100, 100, "too new", GlConfig::new(GlVersion::V4_6)) {
        Err(Error::ContextCreation { version, .. }) => assert_eq!(version, GlVersion::V4_6),
        other => panic!("expected ContextCreation, got {:?}", other.map(|_| ())),
    }

    assert!(
        host.create_window(100, 100, "fine", GlConfig::new(GlVersion::V4_1))
            .is_ok()
    );
}

#[test]
fn test_unreachable_platform_fails_with_window_creation() {
    init();
    let host = Host::with_platform(SimPlatform::unreachable());
    let result = host.create_window(100, 100, "nowhere", GlConfig::default());
    assert!(matches!(result, Err(Error::WindowCreation(_))));
}

#[test]
fn test_show_twice_equals_once() {
    let (host, sim) = host();
    let window = host.create_window(100, 100, "show", GlConfig::default()).unwrap();

    host.show_window(window).unwrap();
    let once = sim.surface(window).unwrap();
    host.show_window(window).unwrap();

    assert_eq!(sim.surface(window).unwrap(), once);
    assert!(once.visible);
    assert_eq!(host.visibility(window).unwrap(), Visibility::Shown);

    host.hide_window(window).unwrap();
    assert!(!sim.surface(window).unwrap().visible);
}

#[test]
fn test_undecorated_applies_on_show() {
    let (host, sim) = host();
    let window = host
        .create_window_with(
            WindowAttributes {
                title: "bare".to_string(),
                width: 300,
                height: 200,
                decorated: false,
                ..Default::default()
            },
            GlConfig::default(),
        )
        .unwrap();

    assert!(sim.surface(window).unwrap().decorated);
    assert!(!host.is_undecorated(window).unwrap());

    host.show_window(window).unwrap();
    assert!(!sim.surface(window).unwrap().decorated);
    assert!(host.is_undecorated(window).unwrap());
}

#[test]
fn test_decoration_toggle_after_show_waits_for_next_show() {
    let (host, sim) = host();
    let window = host.create_window(300, 200, "toggle", GlConfig::default()).unwrap();
    host.show_window(window).unwrap();

    host.set_undecorated(window, true).unwrap();
    assert!(sim.surface(window).unwrap().decorated);

    host.show_window(window).unwrap();
    assert!(!sim.surface(window).unwrap().decorated);

    host.set_undecorated(window, false).unwrap();
    host.hide_window(window).unwrap();
    host.show_window(window).unwrap();
    assert!(sim.surface(window).unwrap().decorated);
}

#[test]
fn test_geometry_setters_reach_the_native_window() {
    let (host, sim) = host();
    let window = host
        .create_window_with(
            WindowAttributes {
                position: Some(WindowPosition { x: 40, y: 50 }),
                ..Default::default()
            },
            GlConfig::default(),
        )
        .unwrap();
    assert_eq!(host.position(window).unwrap(), (40, 50));
    assert_eq!(host.size(window).unwrap(), (800, 600));

    host.set_title(window, "renamed").unwrap();
    host.set_size(window, 1024, 768).unwrap();
    host.set_position(window, -10, 20).unwrap();
    host.set_border_width(window, 3).unwrap();

    let surface = sim.surface(window).unwrap();
    assert_eq!(surface.title, "renamed");
    assert_eq!(surface.size, (1024, 768));
    assert_eq!(surface.position, (-10, 20));
    assert_eq!(surface.border_width, 3);
    assert_eq!(host.size(window).unwrap(), (1024, 768));
    assert_eq!(host.position(window).unwrap(), (-10, 20));
}

#[test]
fn test_minimize_and_maximize() {
    let (host, sim) = host();
    let window = host.create_window(100, 100, "state", GlConfig::default()).unwrap();
    assert_eq!(host.size_state(window).unwrap(), SizeState::Normal);

    host.set_maximized(window, true).unwrap();
    assert_eq!(host.size_state(window).unwrap(), SizeState::Maximized);
    assert!(sim.surface(window).unwrap().maximized);

    host.set_minimized(window, true).unwrap();
    assert_eq!(host.size_state(window).unwrap(), SizeState::Minimized);
    let surface = sim.surface(window).unwrap();
    assert!(surface.minimized);
    assert!(!surface.maximized);

    host.set_minimized(window, false).unwrap();
    assert_eq!(host.size_state(window).unwrap(), SizeState::Normal);
}

#[test]
fn test_swap_without_current_context_fails() {
    let (host, sim) = host();
    let window = host.create_window(100, 100, "swap", GlConfig::default()).unwrap();

    assert!(matches!(
        host.swap_buffers(window),
        Err(Error::NoCurrentContext(w)) if w == window
    ));
    assert!(matches!(
        host.set_swap_interval(window, 0),
        Err(Error::NoCurrentContext(_))
    ));

    host.make_current(window).unwrap();
    host.swap_buffers(window).unwrap();
    host.set_swap_interval(window, 0).unwrap();

    let surface = sim.surface(window).unwrap();
    assert_eq!(surface.frames_presented, 1);
    assert_eq!(surface.swap_interval, 0);

    host.release_current(window).unwrap();
    assert!(!host.is_current(window));
    assert!(matches!(
        host.swap_buffers(window),
        Err(Error::NoCurrentContext(_))
    ));
}

#[test]
fn test_creating_a_window_keeps_the_current_context() {
    let (host, sim) = host();
    let first = host.create_window(100, 100, "first", GlConfig::default()).unwrap();
    host.make_current(first).unwrap();

    let second = host.create_window(100, 100, "second", GlConfig::default()).unwrap();
    assert!(host.is_current(first));
    assert!(!host.is_current(second));
    assert_eq!(sim.current_context(), Some(first));

    host.make_current(second).unwrap();
    assert!(!host.is_current(first));
    assert!(matches!(
        host.swap_buffers(first),
        Err(Error::NoCurrentContext(_))
    ));
    host.swap_buffers(second).unwrap();
}

#[test]
fn test_destroying_the_current_window_clears_currency() {
    let (host, sim) = host();
    let window = host.create_window(100, 100, "gone", GlConfig::default()).unwrap();
    host.make_current(window).unwrap();

    host.destroy_window(window).unwrap();
    assert!(!host.is_current(window));
    assert_eq!(sim.current_context(), None);
    assert!(sim.surface(window).unwrap().destroyed);
}

#[test]
fn test_contexts_are_per_host() {
    init();
    let a = Host::with_platform(SimPlatform::new());
    let b = Host::with_platform(SimPlatform::new());
    let wa = a.create_window(10, 10, "a", GlConfig::default()).unwrap();
    let wb = b.create_window(10, 10, "b", GlConfig::default()).unwrap();

    // both hosts hand out the same first id
    assert_eq!(wa, wb);

    a.make_current(wa).unwrap();
    assert!(a.is_current(wa));
    assert!(!b.is_current(wb));
    assert!(matches!(b.swap_buffers(wb), Err(Error::NoCurrentContext(_))));
}

#[test]
fn test_proc_address_depends_on_version() {
    let (host, _) = host();
    let old = host.create_window(10, 10, "3.3", GlConfig::new(GlVersion::V3_3)).unwrap();
    let new = host.create_window(10, 10, "4.6", GlConfig::new(GlVersion::V4_6)).unwrap();

    host.make_current(old).unwrap();
    assert!(!host.get_proc_address(old, "glClear").unwrap().is_null());
    assert!(host.get_proc_address(old, "glDispatchCompute").unwrap().is_null());

    host.make_current(new).unwrap();
    assert!(!host.get_proc_address(new, "glDispatchCompute").unwrap().is_null());
    assert!(host.get_proc_address(new, "glNotAFunction").unwrap().is_null());
    assert!(host.get_proc_address(new, "gl\0Clear").unwrap().is_null());
}

#[test]
fn test_proc_address_needs_the_window_context_current() {
    let (host, _) = host();
    let first = host.create_window(10, 10, "first", GlConfig::new(GlVersion::V3_3)).unwrap();
    let second = host.create_window(10, 10, "second", GlConfig::new(GlVersion::V4_6)).unwrap();

    assert!(matches!(
        host.get_proc_address(first, "glGenBuffers"),
        Err(Error::NoCurrentContext(w)) if w == first
    ));

    // another window's context must not answer for this one
    host.make_current(first).unwrap();
    assert!(matches!(
        host.get_proc_address(second, "glGenBuffers"),
        Err(Error::NoCurrentContext(w)) if w == second
    ));
    assert!(!host.get_proc_address(first, "glGenBuffers").unwrap().is_null());

    host.release_current(first).unwrap();
    assert!(matches!(
        host.get_proc_address(first, "glGenBuffers"),
        Err(Error::NoCurrentContext(_))
    ));
}

#[test]
fn test_mutators_on_destroyed_window_fail() {
    let (host, _) = host();
    let window = host.create_window(10, 10, "doomed", GlConfig::default()).unwrap();
    host.destroy_window(window).unwrap();

    assert!(!host.is_window_alive(window));
    assert!(matches!(host.destroy_window(window), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.show_window(window), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.set_title(window, "x"), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.set_size(window, 1, 1), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.make_current(window), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.swap_buffers(window), Err(Error::InvalidWindow(_))));
    assert!(matches!(host.latest_downed_key(window), Err(Error::InvalidWindow(_))));
    assert!(matches!(
        host.get_proc_address(window, "glClear"),
        Err(Error::InvalidWindow(_))
    ));
}

#[test]
fn test_window_ids_are_not_reused() {
    let (host, _) = host();
    let first = host.create_window(10, 10, "first", GlConfig::default()).unwrap();
    host.destroy_window(first).unwrap();
    let second = host.create_window(10, 10, "second", GlConfig::default()).unwrap();

    assert_ne!(first, second);
    assert!(matches!(host.title(first), Err(Error::InvalidWindow(_))));
}

#[test]
fn test_dropping_the_host_releases_windows() {
    init();
    let sim = SimPlatform::new();
    let host = Host::with_platform(sim.clone());
    let window = host.create_window(10, 10, "dropped", GlConfig::default()).unwrap();
    host.make_current(window).unwrap();

    drop(host);

    assert!(sim.surface(window).unwrap().destroyed);
    assert_eq!(sim.current_context(), None);
}

#[test]
fn test_simulated_window_has_no_raw_handle() {
    let (host, _) = host();
    let window = host.create_window(10, 10, "handle", GlConfig::default()).unwrap();
    assert!(matches!(host.raw_window_handle(window), Err(Error::Handle(_))));
}
