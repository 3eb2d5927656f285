use crate::capture::Frame;

/// Pure function from a pixel buffer to the payload of a code in it, if any.
///
/// Implementations must not block for long: they run on every sampling tick.
pub trait CodeDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Option<String>;
}

impl<F> CodeDecoder for F
where
    F: Fn(&Frame) -> Option<String> + Send + Sync,
{
    fn decode(&self, frame: &Frame) -> Option<String> {
        self(frame)
    }
}
