//! This crate plays XSVF images, the compact binary form of SVF that Xilinx tools emit for
//! programming CPLDs and FPGAs, against a single JTAG TAP driven through four bit-banged pins.
//!
//! At the lowest level is the `PinDriver` trait in `cable`: set TMS or TDI, pulse TCK, read
//! TDO and wait.  `Gpio` implements it for any set of `embedded-hal` pins, and with the `std`
//! feature `Ft232r` implements it for FTDI adapters in bit-bang mode.
//!
//! Above that, `JtagSM` keeps track of the TAP state, walks to any state by the shortest path
//! and shifts bits in and out of the instruction and data registers.  `sdr::run_sdr` builds
//! data register scans with masked TDO verification and bounded retry on top of it.
//!
//! `Player` ties it together: it decodes the image with `xsvf::Decoder`, executes each
//! instruction in a fresh `Session` and reports progress in tenths of the image.
//!
//! # Example
//! ```no_run
//! use xsvf_player::cable;
//! use xsvf_player::progress::Tick;
//! use xsvf_player::Player;
//! let cable = cable::new_from_string("ft232r", 1 << 16).expect("cable");
//! let mut player = Player::new(cable);
//! let image = std::fs::read("design.xsvf").expect("read");
//! let done = player.play(&image, &mut |tick: Tick| println!("{:?}", tick));
//! println!("{:?}", done);
//! ```


#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod cable;
pub mod config;
pub mod error;
pub mod player;
pub mod progress;
pub mod sdr;
pub mod statemachine;
pub mod xsvf;

pub use config::Config;
pub use error::{Error, Result};
pub use player::{Completed, Player, Session};
