//! Intermediate position generation along a chosen heading.

use crate::geometry::Position;

/// Next position `step_length` along `heading`, with altitude snapped to `target_down`.
pub fn next_step(current: &Position, heading: f32, step_length: f32, target_down: f32) -> Position {
    let rad = heading.to_radians();
    Position::new(
        current.north + step_length * rad.cos(),
        current.east + step_length * rad.sin(),
        target_down,
    )
}
