//! A ready-made extension for demos and tests.

/// Entry point takes no arguments and returns `4 + 6` in `rax`.
///
/// ```asm
///   mov eax, 4
///   add eax, 6
///   ret
/// ```
#[rustfmt::skip]
pub static ADD_FOUR_AND_SIX: &[u8] = &[
    0xb8, 0x04, 0x00, 0x00, 0x00,   // mov eax, 4
    0x83, 0xc0, 0x06,               // add eax, 6
    0xc3,                           // ret
];

/// What [`ADD_FOUR_AND_SIX`] returns.
pub const ADD_FOUR_AND_SIX_RESULT: usize = 10;
