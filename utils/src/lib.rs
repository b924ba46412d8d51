/// Rounds `num` up to the next multiple of `step`. Multiples of `step` stay as they are.
pub fn round_up(step: u32, num: u32) -> u32 {
    match num % step {
        0 => num,
        rest => num + (step - rest),
    }
}

/// How many bytes have to be added to `num` to reach a multiple of `step`.
pub fn padding_to(step: u32, num: u32) -> u32 {
    round_up(step, num) - num
}
