/// Issues command correlation tokens: 1, 2, 3, ... with no gaps or reuse.
///
/// Not shareable across threads; a session owns exactly one.
#[derive(Debug, Default)]
pub struct TokenGenerator {
    last: u64,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently issued token, 0 before the first call.
    pub fn last(&self) -> u64 {
        self.last
    }
}
