use std::thread;

use belog::{fmt, Hex, Padding};

fn input_thread() {
    if !belog::enable() {
        return;
    }

    for scan_code in [0x11u16, 0x1e, 0x1f, 0x20, 0x2c] {
        belog::log!(
            "  Kbd: make=",
            fmt(scan_code, (Hex, Padding::new(4, '0'))),
            " pressed=",
            true
        );
    }
}

fn view_thread() {
    if !belog::enable() {
        return;
    }

    let mut yaw = 0.0f32;
    for _ in 0..5 {
        yaw += 0.005;
        belog::log!(" View: (", yaw.cos(), ", ", yaw.sin(), ", ", 0.0f32, ")");
    }
}

fn main() {
    let drain = thread::spawn(belog::do_logging);

    let input = thread::spawn(input_thread);
    let view = thread::spawn(view_thread);
    input.join().expect("input thread");
    view.join().expect("view thread");

    belog::enable();
    belog::log_info!("demo producers finished, draining");
    belog::shutdown();
    drain.join().expect("drain thread");
    println!();
}
