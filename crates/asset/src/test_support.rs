//! Fixture helpers for unit tests.

use std::{
    fs,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory under the system temp dir, removed on drop.
pub struct TempDir {
    root: PathBuf,
}

impl TempDir {
    pub fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "kiln-{}-{}-{}",
            tag,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root).expect("create temp dir");
        Self { root }
    }

    pub fn path(&self, name: &str) -> String {
        self.root.join(name).to_string_lossy().into_owned()
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> String {
        let path = self.path(name);
        if let Some(parent) = PathBuf::from(&path).parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    /// Write a PNG whose bytes count up from zero.
    pub fn write_png(&self, name: &str, width: u32, height: u32, channels: u8) -> String {
        let color = match channels {
            1 => image::ExtendedColorType::L8,
            2 => image::ExtendedColorType::La8,
            3 => image::ExtendedColorType::Rgb8,
            4 => image::ExtendedColorType::Rgba8,
            other => panic!("PNG cannot hold {other} channels"),
        };
        let len = (width * height) as usize * channels as usize;
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let path = self.path(name);
        image::save_buffer(&path, &bytes, width, height, color).expect("write png fixture");
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Records emitted on the current thread, so parallel tests do not see each
/// other's messages.
struct ThreadLogger;

thread_local! {
    static RECORDS: std::cell::RefCell<Option<Vec<(log::Level, String)>>> =
        const { std::cell::RefCell::new(None) };
}

impl log::Log for ThreadLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.with(|records| {
            if let Some(records) = records.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

/// Run `f` and return what it logged on this thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<(log::Level, String)>) {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        if log::set_logger(&ThreadLogger).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });

    RECORDS.with(|records| *records.borrow_mut() = Some(Vec::new()));
    let out = f();
    let logs = RECORDS.with(|records| records.borrow_mut().take().unwrap_or_default());
    (out, logs)
}
