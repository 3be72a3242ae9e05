/// Domain interface for the motor that turns the microphone.
///
/// Implementations clamp to their own mechanical range and block until the
/// move is acknowledged, so at most one command is ever in flight.
pub trait Actuator: Send {
    /// Turns the microphone to `bearing` degrees. Returns whether the move
    /// was acknowledged.
    fn move_to(&mut self, bearing: f64) -> bool;

    /// Releases the underlying connection. Safe to call more than once.
    fn close(&mut self);
}
