//! # Relative branch patching
//!
//! x86-64 `call rel32` and `jmp rel32` encode their target as a signed
//! displacement from the address of the *next* instruction:
//!
//! ```text
//!   E8 dd dd dd dd        target = end_of_instruction + disp32
//!   ^opcode ^disp32 (little endian)
//! ```
//!
//! A branch prepared at one address therefore points somewhere else once its
//! bytes are copied to another. [`RelBranch::relocate`] fixes that up:
//!
//! ```text
//!   disp' = disp + (authored_end - site_end)
//! ```
//!
//! [`write_site`] then stores the relocated branch over a reserved run of
//! NOP padding. The first byte is turned into `int3` while the displacement
//! is written, so a CPU racing through the site traps instead of executing a
//! torn instruction.

use core::sync::atomic::{Ordering, fence};

/// `call rel32`
pub const CALL_REL32: u8 = 0xE8;
/// `jmp rel32`
pub const JMP_REL32: u8 = 0xE9;
pub const INT3: u8 = 0xCC;

/// Length of a rel32 branch, and therefore of every hook site.
pub const BRANCH_LEN: usize = 5;

/// `nop dword ptr [rax + rax*1 + 0]`, the canonical 5-byte NOP.
pub const NOP5: [u8; BRANCH_LEN] = [0x0F, 0x1F, 0x44, 0x00, 0x00];

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("hook site is {actual} bytes, expected {expected}")]
    SiteSize { expected: usize, actual: usize },
    #[error("opcode {0:#04x} is not a rel32 call or jmp")]
    NotABranch(u8),
    #[error("branch target is out of rel32 range")]
    OutOfRange,
    #[error("hook site holds neither padding nor the expected branch")]
    SiteOccupied,
}

/// A rel32 branch together with the address its displacement was computed
/// against, i.e. the address just past the instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RelBranch {
    opcode: u8,
    disp: i32,
    authored_end: u64,
}

impl RelBranch {
    /// Encodes `call target` for an instruction ending at `end`.
    ///
    /// # Errors
    /// [`PatchError::OutOfRange`] if `target` is more than ±2 GiB from `end`.
    pub fn call(target: u64, end: u64) -> Result<Self, PatchError> {
        Self::encode_to(CALL_REL32, target, end)
    }

    /// Encodes `jmp target` for an instruction ending at `end`.
    ///
    /// # Errors
    /// [`PatchError::OutOfRange`] if `target` is more than ±2 GiB from `end`.
    pub fn jmp(target: u64, end: u64) -> Result<Self, PatchError> {
        Self::encode_to(JMP_REL32, target, end)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn encode_to(opcode: u8, target: u64, end: u64) -> Result<Self, PatchError> {
        let disp = i32::try_from(target.wrapping_sub(end) as i64)
            .map_err(|_| PatchError::OutOfRange)?;
        Ok(Self {
            opcode,
            disp,
            authored_end: end,
        })
    }

    /// Reads an already encoded branch whose last byte sits just before
    /// `authored_end`.
    ///
    /// # Errors
    /// [`PatchError::NotABranch`] for any opcode other than `E8`/`E9`.
    pub fn decode(bytes: [u8; BRANCH_LEN], authored_end: u64) -> Result<Self, PatchError> {
        let [opcode, d0, d1, d2, d3] = bytes;
        if opcode != CALL_REL32 && opcode != JMP_REL32 {
            return Err(PatchError::NotABranch(opcode));
        }
        Ok(Self {
            opcode,
            disp: i32::from_le_bytes([d0, d1, d2, d3]),
            authored_end,
        })
    }

    #[must_use]
    pub const fn opcode(&self) -> u8 {
        self.opcode
    }

    #[must_use]
    pub const fn displacement(&self) -> i32 {
        self.disp
    }

    #[must_use]
    pub const fn authored_end(&self) -> u64 {
        self.authored_end
    }

    /// Absolute address the branch transfers control to.
    #[must_use]
    pub const fn target(&self) -> u64 {
        self.authored_end.wrapping_add_signed(self.disp as i64)
    }

    /// Re-targets the displacement for an instruction ending at `site_end`,
    /// keeping the absolute target unchanged.
    ///
    /// # Errors
    /// [`PatchError::OutOfRange`] if the new displacement no longer fits in
    /// 32 bits.
    #[allow(clippy::cast_possible_wrap)]
    pub fn relocate(self, site_end: u64) -> Result<Self, PatchError> {
        let delta = self.authored_end.wrapping_sub(site_end) as i64;
        let disp = i64::from(self.disp)
            .checked_add(delta)
            .and_then(|d| i32::try_from(d).ok())
            .ok_or(PatchError::OutOfRange)?;
        Ok(Self {
            opcode: self.opcode,
            disp,
            authored_end: site_end,
        })
    }

    #[must_use]
    pub const fn to_bytes(&self) -> [u8; BRANCH_LEN] {
        let d = self.disp.to_le_bytes();
        [self.opcode, d[0], d[1], d[2], d[3]]
    }
}

/// Whether `site` still holds its original padding.
#[must_use]
pub fn is_padding(site: &[u8]) -> bool {
    site == NOP5 || (!site.is_empty() && site.iter().all(|&b| b == 0x90))
}

/// Installs `branch` over the hook site `site`, which lives at `site_addr`.
///
/// Returns `Ok(false)` if the site already holds exactly this branch, so
/// repeating an install leaves the bytes untouched.
///
/// # Errors
/// * [`PatchError::SiteSize`] if `site` is not [`BRANCH_LEN`] bytes long.
/// * [`PatchError::SiteOccupied`] if it holds anything but padding or the
///   relocated branch.
/// * [`PatchError::OutOfRange`] if the branch cannot reach its target from
///   the site.
pub fn write_site(site: &mut [u8], site_addr: u64, branch: RelBranch) -> Result<bool, PatchError> {
    if site.len() != BRANCH_LEN {
        return Err(PatchError::SiteSize {
            expected: BRANCH_LEN,
            actual: site.len(),
        });
    }

    let bytes = branch.relocate(site_addr + BRANCH_LEN as u64)?.to_bytes();
    if site == bytes {
        return Ok(false);
    }
    if !is_padding(site) {
        return Err(PatchError::SiteOccupied);
    }

    let p = site.as_mut_ptr();
    unsafe {
        core::ptr::write_volatile(p, INT3);
        fence(Ordering::SeqCst);
        for (i, &b) in bytes.iter().enumerate().skip(1) {
            core::ptr::write_volatile(p.add(i), b);
        }
        fence(Ordering::SeqCst);
        core::ptr::write_volatile(p, bytes[0]);
    }
    fence(Ordering::SeqCst);
    Ok(true)
}
