//! # i386 Kernel Image
//!
//! ```text
//! multiboot2 loader
//!   → _start          boot stack, no Rust yet
//!   → kernel_entry    logger, early init, CPU driver
//!   → idle            hlt with interrupts enabled
//! ```
//!
//! The image is built for a bare-metal i686 target (`target_os = "none"`) and
//! linked with `kernel.ld` at `PHYS_LOAD`. On the host only the pure parts are
//! compiled, so their tests can run.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]
#![allow(unsafe_code)]

mod boot_paging;
mod early_panic;
#[cfg(all(target_os = "none", target_arch = "x86"))]
mod entry;
#[cfg(all(target_os = "none", target_arch = "x86"))]
mod exception_stubs;
mod multiboot_header;

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    early_panic::early_panic(format_args!("{info}"))
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("The kernel only runs on bare metal; build it for an i686 `target_os = \"none\"` target.");
}
