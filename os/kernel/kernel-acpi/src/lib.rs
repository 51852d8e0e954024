//! # ACPI table discovery
//!
//! Boot-time lookup of the firmware's system description tables. Nothing
//! here interacts with the rest of the kernel beyond reading physical
//! memory through [`PhysMapRo`].
//!
//! ```text
//! EBDA (first KiB) or 0xE0000..0x100000, 16-byte aligned
//!     ↓ "RSD PTR " + checksum
//! RSDP (ACPI 1.0) / XSDP (ACPI 2.0+)
//!     ↓
//! RSDT (32-bit entries) / XSDT (64-bit entries)
//!     ↓ 4-byte signature + checksum
//! FACP, APIC, HPET, ...
//! ```
//!
//! Every structure is checksummed before use: the bytes it covers must sum
//! to zero modulo 256. Firmware data is treated as untrusted, so length
//! fields are bounds checked as well.
//!
//! ```rust,no_run
//! use kernel_acpi::{PhysMapRo, find_rsdp, sdt};
//!
//! struct Identity;
//! impl PhysMapRo for Identity {
//!     unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
//!         unsafe { core::slice::from_raw_parts(paddr as *const u8, len) }
//!     }
//! }
//!
//! let roots = unsafe { find_rsdp(&Identity) }.expect("no usable RSDP");
//! let madt = unsafe { sdt::find_table(&Identity, &roots, *b"APIC") };
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod error;
pub mod rsdp;
mod search;
pub mod sdt;

pub use error::AcpiError;
pub use search::{BIOS_AREA, EBDA_SEGMENT_PTR, find_rsdp};

/// Map a physical region and return a *read-only* byte slice for its contents.
/// You provide the implementation (identity map, kmap, etc.).
pub trait PhysMapRo {
    /// # Safety
    /// The implementor must ensure the returned slice is valid for `len` bytes.
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8];
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
