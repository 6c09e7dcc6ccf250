//! Guest programs, written as WebAssembly text, exercising the harness ABI.
//!
//! Every guest shares one memory layout: a bump-allocator cursor at 256 (the persistent
//! counter right behind it), the canned reply frame at 512, the probe path at 768, the
//! drive read buffer at 1024 and allocations from 4096 up. Handlers patch a single digit
//! of the reply in place, so what a test observes in `Output` is a direct function of
//! the state the guest carried.

use core::fmt::Write;

use crate::constants::abi;

const CURSOR: u32 = 256;
const COUNTER: u32 = 260;
const COUNTER64: u32 = 264;
const RESPONSE: u32 = 512;
const PATH: u32 = 768;
const READ_BUF: u32 = 1024;
const HEAP_BASE: u32 = 4096;

const REPLY_TEMPLATE: &str = r#"{"ok":true,"response":{"Output":"0"}}"#;

/// Escapes raw bytes for a WAT data segment.
fn wat_escape(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, byte| {
        let _ = write!(out, "\\{byte:02x}");
        out
    })
}

/// Length-prefixes a reply body the way the guest ABI frames it.
fn framed(body: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(abi::FRAME_HEADER + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(body.as_bytes());
    frame
}

/// Address of the patchable output digit inside the canned reply frame.
fn digit_address() -> u32 {
    let marker = "\"Output\":\"";
    let index = REPLY_TEMPLATE.find(marker).expect("reply template has an Output field");
    RESPONSE + (abi::FRAME_HEADER + index + marker.len()) as u32
}

fn cursor_data32() -> String {
    let init = wat_escape(&HEAP_BASE.to_le_bytes());
    format!(r#"(data (i32.const {CURSOR}) "{init}")"#)
}

fn alloc32() -> String {
    format!(
        r#"(func (export "alloc") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (i32.load (i32.const {CURSOR})))
    (i32.store (i32.const {CURSOR}) (i32.add (local.get $ptr) (local.get $len)))
    (local.get $ptr))"#
    )
}

/// Guest that charges `charge` gas per call, increments a counter that lives in its
/// heap and replies with the counter digit as its output.
pub fn counter_guest(pages: u32, charge: u64) -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    let frame = wat_escape(&framed(REPLY_TEMPLATE));
    let digit = digit_address();
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (memory (export "memory") {pages})
  {cursor}
  (data (i32.const {RESPONSE}) "{frame}")
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (call $usegas (i64.const {charge}))
    (i32.store (i32.const {COUNTER}) (i32.add (i32.load (i32.const {COUNTER})) (i32.const 1)))
    (i32.store8 (i32.const {digit}) (i32.add (i32.const 48) (i32.load (i32.const {COUNTER}))))
    (i32.const {RESPONSE})))
"#
    )
}

/// 64-bit flavor of [`counter_guest`], with pointer-sized entry points and an `i64`
/// indexed memory.
pub fn counter_guest64(charge: u64) -> String {
    let cursor_init = wat_escape(&u64::from(HEAP_BASE).to_le_bytes());
    let frame = wat_escape(&framed(REPLY_TEMPLATE));
    let digit = digit_address();
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (memory (export "memory") i64 1)
  (data (i64.const {CURSOR}) "{cursor_init}")
  (data (i64.const {RESPONSE}) "{frame}")
  (func (export "alloc") (param $len i64) (result i64)
    (local $ptr i64)
    (local.set $ptr (i64.load (i64.const {CURSOR})))
    (i64.store (i64.const {CURSOR}) (i64.add (local.get $ptr) (local.get $len)))
    (local.get $ptr))
  (func (export "handle") (param $msg i64) (param $env i64) (result i64)
    (call $usegas (i64.const {charge}))
    (i32.store (i64.const {COUNTER64}) (i32.add (i32.load (i64.const {COUNTER64})) (i32.const 1)))
    (i32.store8 (i64.const {digit}) (i32.add (i32.const 48) (i32.load (i64.const {COUNTER64}))))
    (i64.const {RESPONSE})))
"#
    )
}

/// Guest that replies with a digit derived from the injected random source.
pub fn random_digit_guest() -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    let frame = wat_escape(&framed(REPLY_TEMPLATE));
    let digit = digit_address();
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (import "env" "random_f64" (func $random (result f64)))
  (memory (export "memory") 1)
  {cursor}
  (data (i32.const {RESPONSE}) "{frame}")
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (call $usegas (i64.const 100))
    (i32.store8 (i32.const {digit})
      (i32.add (i32.const 48) (i32.trunc_f64_s (f64.mul (call $random) (f64.const 10)))))
    (i32.const {RESPONSE})))
"#
    )
}

/// Guest that replies with the low decimal digit of the injected clock.
pub fn clock_digit_guest() -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    let frame = wat_escape(&framed(REPLY_TEMPLATE));
    let digit = digit_address();
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (import "env" "clock_ms" (func $clock (result i64)))
  (memory (export "memory") 1)
  {cursor}
  (data (i32.const {RESPONSE}) "{frame}")
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (call $usegas (i64.const 100))
    (i32.store8 (i32.const {digit})
      (i32.add (i32.const 48) (i32.wrap_i64 (i64.rem_u (call $clock) (i64.const 10)))))
    (i32.const {RESPONSE})))
"#
    )
}

/// Guest that opens `path` on the drive, reads up to `read_len` bytes and replies with
/// `x` when the open is denied, `e` when the read fails, or the byte count as a digit.
pub fn drive_probe_guest(path: &str, read_len: u32) -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    let frame = wat_escape(&framed(REPLY_TEMPLATE));
    let digit = digit_address();
    let path_len = path.len();
    let path_bytes = wat_escape(path.as_bytes());
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (import "drive" "open" (func $open (param i32 i32) (result i32)))
  (import "drive" "read" (func $read (param i32 i32 i32) (result i32)))
  (import "drive" "close" (func $close (param i32) (result i32)))
  (memory (export "memory") 1)
  {cursor}
  (data (i32.const {RESPONSE}) "{frame}")
  (data (i32.const {PATH}) "{path_bytes}")
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (local $fd i32)
    (local $n i32)
    (call $usegas (i64.const 100))
    (local.set $fd (call $open (i32.const {PATH}) (i32.const {path_len})))
    (if (i32.eqz (local.get $fd))
      (then
        (i32.store8 (i32.const {digit}) (i32.const 120))
        (return (i32.const {RESPONSE}))))
    (local.set $n (call $read (local.get $fd) (i32.const {READ_BUF}) (i32.const {read_len})))
    (drop (call $close (local.get $fd)))
    (if (i32.lt_s (local.get $n) (i32.const 0))
      (then
        (i32.store8 (i32.const {digit}) (i32.const 101))
        (return (i32.const {RESPONSE}))))
    (i32.store8 (i32.const {digit}) (i32.add (i32.const 48) (local.get $n)))
    (i32.const {RESPONSE})))
"#
    )
}

/// Guest that always replies with the given body, verbatim.
pub fn fixed_reply_guest(body: &str) -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    let frame = wat_escape(&framed(body));
    format!(
        r#"(module
  (import "metering" "usegas" (func $usegas (param i64)))
  (memory (export "memory") 1)
  {cursor}
  (data (i32.const {RESPONSE}) "{frame}")
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (call $usegas (i64.const 100))
    (i32.const {RESPONSE})))
"#
    )
}

/// Guest whose handler traps immediately.
pub fn trap_guest() -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    format!(
        r#"(module
  (memory (export "memory") 1)
  {cursor}
  {alloc}
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (unreachable)))
"#
    )
}

/// Guest missing the `handle` export.
pub fn no_handle_guest() -> String {
    let cursor = cursor_data32();
    let alloc = alloc32();
    format!(
        r#"(module
  (memory (export "memory") 1)
  {cursor}
  {alloc})
"#
    )
}

/// Guest whose `alloc` export has the wrong shape.
pub fn bad_alloc_guest() -> String {
    format!(
        r#"(module
  (memory (export "memory") 1)
  (func (export "alloc") (param i32 i32) (result i32) (i32.const 0))
  (func (export "handle") (param $msg i32) (param $env i32) (result i32)
    (i32.const {RESPONSE})))
"#
    )
}
