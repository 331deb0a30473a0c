//! End-to-end sessions against a captured byte stream.
//!
//! Each test drives a manager over a fixed 80x25 geometry and asserts on
//! the exact control sequences reaching the stream: row addressing, the
//! scroll region shrinking and restoring, and teardown ordering.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use glint_runtime::{
    Content, CounterOptions, Manager, ResizeMode, StatusOptions, StreamTarget,
};
use glint_term::Geometry;

#[derive(Clone, Default)]
struct CaptureSink(Rc<RefCell<Vec<u8>>>);

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CaptureSink {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

fn session(sink: &CaptureSink) -> Manager {
    Manager::builder()
        .stream(StreamTarget::Custom(Box::new(sink.clone())))
        .geometry(Geometry {
            width: 80,
            height: 25,
        })
        .enabled(true)
        .no_resize(true)
        .min_refresh(Duration::ZERO)
        .build()
}

#[test]
fn widgets_stack_and_the_region_shrinks_in_steps() {
    let sink = CaptureSink::default();
    let manager = session(&sink);

    let _a = manager.status_bar(StatusOptions::new().message("alpha")).unwrap();
    assert!(sink.contents().contains("\x1b[1;24r"));

    let _b = manager.status_bar(StatusOptions::new().message("beta")).unwrap();
    assert!(sink.contents().contains("\x1b[1;23r"));

    let _c = manager.status_bar(StatusOptions::new().message("gamma")).unwrap();
    let contents = sink.contents();
    assert!(contents.contains("\x1b[1;22r"));
    assert_eq!(manager.scroll_offset(), 4);

    // Each shrink step scrolled existing output up before claiming rows.
    let first_region = contents.find("\x1b[1;24r").unwrap();
    let second_region = contents.find("\x1b[1;23r").unwrap();
    let third_region = contents.find("\x1b[1;22r").unwrap();
    assert!(first_region < second_region && second_region < third_region);
}

#[test]
fn counter_session_renders_progress_and_completion() {
    let sink = CaptureSink::default();
    let manager = session(&sink);
    let counter = manager
        .counter(
            CounterOptions::new()
                .desc("ingest")
                .unit("rows")
                .total(100.0),
        )
        .unwrap();

    counter.update(25.0).unwrap();
    let contents = sink.contents();
    assert!(contents.contains("ingest"), "{contents:?}");
    assert!(contents.contains(" 25%|"), "{contents:?}");
    assert!(contents.contains(" 25/100"), "{contents:?}");

    counter.update(75.0).unwrap();
    let contents = sink.contents();
    assert!(contents.contains("100%|"), "{contents:?}");
    assert!(contents.contains("100/100"), "{contents:?}");
    assert!(contents.contains("<00:00"), "{contents:?}");
}

#[test]
fn counter_without_total_renders_in_counter_mode() {
    let sink = CaptureSink::default();
    let manager = session(&sink);
    let counter = manager
        .counter(CounterOptions::new().desc("scanned").unit("files"))
        .unwrap();

    counter.update(3.0).unwrap();
    let contents = sink.contents();
    assert!(contents.contains("scanned 3 files"), "{contents:?}");
    assert!(!contents.contains('|'), "no bar rail in counter mode");
}

#[test]
fn overflow_past_total_falls_back_to_counter_mode() {
    let sink = CaptureSink::default();
    let manager = session(&sink);
    let counter = manager.counter(CounterOptions::new().total(10.0)).unwrap();

    counter.update(15.0).unwrap();
    let contents = sink.contents();
    assert!(contents.contains("15 "), "{contents:?}");
    assert!(!contents.contains('%'), "no percentage once past total");
}

#[test]
fn log_lines_interleave_without_touching_widget_rows() {
    let sink = CaptureSink::default();
    let manager = session(&sink);
    let _bar = manager
        .status_bar(StatusOptions::new().message("steady"))
        .unwrap();

    // Ordinary output goes through the scrolling region; the manager only
    // writes inside the reserved rows when asked.
    manager
        .write_at(2, Content::Text("diagnostic".to_owned()))
        .unwrap();
    let contents = sink.contents();
    assert!(contents.contains("\x1b[24;1H\r\x1b[0Kdiagnostic"), "{contents:?}");
}

#[test]
fn teardown_restores_region_cursor_and_prompt_row() {
    let sink = CaptureSink::default();
    let manager = session(&sink);
    let _bar = manager
        .status_bar(StatusOptions::new().message("held"))
        .unwrap();

    manager.stop();
    let contents = sink.contents();

    let reset = contents.find("\x1b[r").unwrap();
    let show = contents.find("\x1b[?25h").unwrap();
    assert!(reset < show, "region reset before cursor restore");
    assert!(contents.ends_with('\n'), "prompt pushed below the kept row");
    assert!(!manager.is_enabled());
}

#[test]
fn drop_performs_teardown() {
    let sink = CaptureSink::default();
    {
        let manager = session(&sink);
        let _bar = manager
            .status_bar(StatusOptions::new().message("scoped"))
            .unwrap();
    }
    let contents = sink.contents();
    assert!(contents.contains("\x1b[r"));
    assert!(contents.contains("\x1b[?25h"));
}

#[test]
fn deferred_resize_applies_on_write_not_on_updates() {
    let sink = CaptureSink::default();
    let manager = Manager::builder()
        .stream(StreamTarget::Custom(Box::new(sink.clone())))
        .geometry(Geometry {
            width: 80,
            height: 25,
        })
        .enabled(true)
        .no_resize(true)
        .resize_mode(ResizeMode::Deferred)
        .min_refresh(Duration::ZERO)
        .build();
    let _bar = manager
        .status_bar(StatusOptions::new().message("watching"))
        .unwrap();
    let baseline = sink.contents().matches("\x1b[1;24r").count();

    manager.notify_resize();
    manager.notify_resize();
    assert_eq!(
        sink.contents().matches("\x1b[1;24r").count(),
        baseline,
        "latched resizes wait for a write"
    );

    manager.write_at(0, Content::Text(String::new())).unwrap();
    assert_eq!(
        sink.contents().matches("\x1b[1;24r").count(),
        baseline + 1,
        "one coalesced relayout on the next write"
    );
}

#[test]
fn disabled_session_is_completely_silent() {
    let sink = CaptureSink::default();
    let manager = Manager::builder()
        .stream(StreamTarget::Custom(Box::new(sink.clone())))
        .geometry(Geometry {
            width: 80,
            height: 25,
        })
        .enabled(false)
        .build();

    let counter = manager.counter(CounterOptions::new().total(5.0)).unwrap();
    let bar = manager.status_bar(StatusOptions::new().message("quiet")).unwrap();
    counter.update(5.0).unwrap();
    bar.update("still quiet").unwrap();
    manager.stop();

    assert!(sink.contents().is_empty());
    // Layout is still tracked so a later snapshot sees consistent offsets.
    assert_eq!(counter.offset(), Some(2));
    assert_eq!(bar.offset(), Some(1));
}
