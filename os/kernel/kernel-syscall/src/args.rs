use crate::SyscallError;
use core::ops::Range;
use kernel_ext::UserMemory;

/// The six raw argument words of a syscall, in `rdi, rsi, rdx, r10, r8, r9`
/// order.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SyscallArgs([u64; 6]);

impl SyscallArgs {
    #[must_use]
    pub const fn new(words: [u64; 6]) -> Self {
        Self(words)
    }

    /// Argument `n` as a raw word.
    ///
    /// # Errors
    /// [`SyscallError::NoSuchArgument`] for `n >= 6`.
    pub fn word(&self, n: usize) -> Result<u64, SyscallError> {
        self.0.get(n).copied().ok_or(SyscallError::NoSuchArgument(n))
    }

    /// Argument `n` as a signed integer.
    ///
    /// # Errors
    /// [`SyscallError::NoSuchArgument`] for `n >= 6`.
    pub fn int(&self, n: usize) -> Result<i64, SyscallError> {
        Ok(self.word(n)?.cast_signed())
    }

    /// Argument `n` as the address of code supplied by the caller.
    ///
    /// Nothing checks that the address is mapped or executable. The bytes
    /// are only ever read through [`UserMemory`], which rejects foreign
    /// addresses at copy time.
    ///
    /// # Errors
    /// [`SyscallError::NoSuchArgument`] for `n >= 6`.
    pub fn fn_ptr(&self, n: usize) -> Result<usize, SyscallError> {
        let word = self.word(n)?;
        usize::try_from(word).map_err(|_| SyscallError::BadUserPointer { addr: word, len: 0 })
    }

    /// Argument `n` as a pointer to a kernel object inside `region`.
    ///
    /// # Errors
    /// * [`SyscallError::NoSuchArgument`] for `n >= 6`.
    /// * [`SyscallError::BadKernelPointer`] unless the address lies in
    ///   `region` and is word-aligned.
    pub fn kernel_ptr(&self, n: usize, region: &Range<usize>) -> Result<usize, SyscallError> {
        let word = self.word(n)?;
        match usize::try_from(word) {
            Ok(addr) if region.contains(&addr) && addr % align_of::<usize>() == 0 => Ok(addr),
            _ => Err(SyscallError::BadKernelPointer(word)),
        }
    }

    /// Argument `n` as a pointer to `len` bytes of the caller's memory.
    ///
    /// # Errors
    /// * [`SyscallError::NoSuchArgument`] for `n >= 6`.
    /// * [`SyscallError::BadUserPointer`] if any of the bytes lies outside
    ///   the caller's address space.
    pub fn user_ptr<M>(&self, n: usize, len: usize, mem: &M) -> Result<usize, SyscallError>
    where
        M: UserMemory + ?Sized,
    {
        let word = self.word(n)?;
        match usize::try_from(word) {
            Ok(addr) if mem.is_user_range(addr, len) => Ok(addr),
            _ => Err(SyscallError::BadUserPointer { addr: word, len }),
        }
    }
}
