//! # Host-side code pages
//!
//! Hosted test binaries cannot execute bytes copied into heap memory, so
//! this module provides a [`CodeAllocator`] whose pages are *interpreted*
//! instead. The interpreter understands just enough x86-64 for small,
//! hand-assembled extensions:
//!
//! | bytes             | instruction               |
//! |-------------------|---------------------------|
//! | `90`              | `nop`                     |
//! | `0F 1F 44 00 00`  | `nop dword [rax+rax*1+0]` |
//! | `B8+r id`         | `mov r32, imm32`          |
//! | `[48] C7 /0 id`   | `mov r/m, imm32`          |
//! | `05 id`           | `add eax, imm32`          |
//! | `[48] 83 /0,5,6 ib` | `add`/`sub`/`xor r/m, imm8` |
//! | `[48] 01/29/31/89 /r` | `add`/`sub`/`xor`/`mov r/m, r` |
//! | `C3`              | `ret`                     |
//!
//! Only register operands (`mod = 11`) are supported. Execution starts at
//! the first byte of the page and ends at `ret`, returning `rax`.
//!
//! [`EmulatedUserSpace`] plays the role of a process address space for the
//! loader's user copies.

use crate::{CodeAllocator, CodePage, EntryPoint, ExtError, PAGE_SIZE, UserMemory};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_sync::SpinLock;

/// Hands out heap pages, optionally only a limited number of them.
pub struct EmulatedAllocator {
    remaining: AtomicUsize,
}

impl EmulatedAllocator {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::with_capacity(usize::MAX)
    }

    #[must_use]
    pub const fn with_capacity(pages: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(pages),
        }
    }
}

impl Default for EmulatedAllocator {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl CodeAllocator for EmulatedAllocator {
    type Page = EmulatedPage;

    fn alloc_zeroed_page(&self) -> Option<EmulatedPage> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()?;
        Some(EmulatedPage(Box::new([0; PAGE_SIZE])))
    }
}

/// A heap page run by the interpreter.
pub struct EmulatedPage(Box<[u8; PAGE_SIZE]>);

impl CodePage for EmulatedPage {
    fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.0
    }

    fn as_mut_bytes(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.0
    }

    fn entry(&self) -> EntryPoint {
        EntryPoint::from_addr(self.0.as_ptr() as usize)
    }

    unsafe fn invoke(entry: EntryPoint) -> usize {
        let code = unsafe { core::slice::from_raw_parts(entry.addr() as *const u8, PAGE_SIZE) };
        execute(code)
    }
}

const RAX: usize = 0;

/// Interprets `code` from its first byte up to `ret` and returns `rax`.
///
/// # Panics
/// On any instruction outside the supported subset, or when running off the
/// end of `code`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn execute(code: &[u8]) -> usize {
    let mut cpu = Cpu {
        code,
        pc: 0,
        regs: [0; 8],
    };
    loop {
        let start = cpu.pc;
        let mut op = cpu.byte();
        let wide = op == 0x48;
        if wide {
            op = cpu.byte();
        }

        match op {
            0x90 => {}
            0x0F => {
                let tail = [cpu.byte(), cpu.byte(), cpu.byte(), cpu.byte()];
                assert_eq!(tail, [0x1F, 0x44, 0x00, 0x00], "emulated cpu: bad 0F opcode at {start}");
            }
            0xC3 => return cpu.regs[RAX] as usize,
            0xB8..=0xBF if !wide => {
                let imm = cpu.imm32();
                cpu.set(usize::from(op - 0xB8), imm, false);
            }
            0x05 => {
                let imm = cpu.imm32();
                cpu.alu(Alu::Add, RAX, imm, wide);
            }
            0xC7 => {
                let (ext, rm) = cpu.modrm();
                assert_eq!(ext, 0, "emulated cpu: bad C7 extension at {start}");
                let imm = cpu.imm32();
                cpu.set(rm, imm, wide);
            }
            0x83 => {
                let (ext, rm) = cpu.modrm();
                let imm = cpu.imm8();
                let alu = match ext {
                    0 => Alu::Add,
                    5 => Alu::Sub,
                    6 => Alu::Xor,
                    _ => panic!("emulated cpu: unsupported 83 /{ext} at {start}"),
                };
                cpu.alu(alu, rm, imm, wide);
            }
            0x01 | 0x29 | 0x31 | 0x89 => {
                let (reg, rm) = cpu.modrm();
                let src = cpu.regs[reg];
                let alu = match op {
                    0x01 => Alu::Add,
                    0x29 => Alu::Sub,
                    0x31 => Alu::Xor,
                    _ => Alu::Mov,
                };
                cpu.alu(alu, rm, src, wide);
            }
            other => panic!("emulated cpu: unsupported opcode {other:#04x} at {start}"),
        }
    }
}

enum Alu {
    Add,
    Sub,
    Xor,
    Mov,
}

struct Cpu<'a> {
    code: &'a [u8],
    pc: usize,
    regs: [u64; 8],
}

impl Cpu<'_> {
    fn byte(&mut self) -> u8 {
        let Some(&b) = self.code.get(self.pc) else {
            panic!("emulated cpu: ran off the end of the code at {}", self.pc);
        };
        self.pc += 1;
        b
    }

    /// Sign-extended 32-bit immediate.
    #[allow(clippy::cast_sign_loss)]
    fn imm32(&mut self) -> u64 {
        let raw = [self.byte(), self.byte(), self.byte(), self.byte()];
        i64::from(i32::from_le_bytes(raw)) as u64
    }

    /// Sign-extended 8-bit immediate.
    #[allow(clippy::cast_sign_loss)]
    fn imm8(&mut self) -> u64 {
        i64::from(i8::from_le_bytes([self.byte()])) as u64
    }

    /// Register-direct ModRM byte, as `(reg, rm)`.
    fn modrm(&mut self) -> (usize, usize) {
        let m = self.byte();
        assert_eq!(m >> 6, 0b11, "emulated cpu: memory operands are not supported");
        (usize::from((m >> 3) & 7), usize::from(m & 7))
    }

    fn set(&mut self, reg: usize, value: u64, wide: bool) {
        // 32-bit writes zero the upper half.
        self.regs[reg] = if wide { value } else { value & 0xFFFF_FFFF };
    }

    fn alu(&mut self, alu: Alu, dst: usize, src: u64, wide: bool) {
        let cur = self.regs[dst];
        let value = match alu {
            Alu::Add => cur.wrapping_add(src),
            Alu::Sub => cur.wrapping_sub(src),
            Alu::Xor => cur ^ src,
            Alu::Mov => src,
        };
        self.set(dst, value, wide);
    }
}

/// A flat, contiguous user address space starting at `base`.
pub struct EmulatedUserSpace {
    base: usize,
    memory: SpinLock<Vec<u8>>,
}

impl EmulatedUserSpace {
    #[must_use]
    pub fn new(base: usize, size: usize) -> Self {
        Self {
            base,
            memory: SpinLock::new(vec![0; size]),
        }
    }

    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    fn offset(&self, addr: usize, len: usize) -> Result<usize, ExtError> {
        if self.is_user_range(addr, len) {
            Ok(addr - self.base)
        } else {
            Err(ExtError::CopyFault { addr, len })
        }
    }

    /// Reads back `len` bytes at `addr`.
    ///
    /// # Errors
    /// [`ExtError::CopyFault`] outside the space.
    pub fn read(&self, addr: usize, len: usize) -> Result<Vec<u8>, ExtError> {
        let mut out = vec![0; len];
        self.copy_from_user(&mut out, addr)?;
        Ok(out)
    }

    /// Reads a native-endian machine word at `addr`.
    ///
    /// # Errors
    /// [`ExtError::CopyFault`] outside the space.
    pub fn read_word(&self, addr: usize) -> Result<usize, ExtError> {
        let mut raw = [0; size_of::<usize>()];
        self.copy_from_user(&mut raw, addr)?;
        Ok(usize::from_ne_bytes(raw))
    }
}

impl UserMemory for EmulatedUserSpace {
    fn is_user_range(&self, addr: usize, len: usize) -> bool {
        let size = self.memory.lock().len();
        addr >= self.base
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= self.base + size)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: usize) -> Result<(), ExtError> {
        let offset = self.offset(src, dst.len())?;
        dst.copy_from_slice(&self.memory.lock()[offset..offset + dst.len()]);
        Ok(())
    }

    fn copy_to_user(&self, dst: usize, src: &[u8]) -> Result<(), ExtError> {
        let offset = self.offset(dst, src.len())?;
        self.memory.lock()[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}
