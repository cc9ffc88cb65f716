pub trait Embedder: Send + Sync {
    /// Output dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum token length fed to the model; longer inputs are truncated.
    fn max_len(&self) -> usize;
    /// One vector per input text, same order. Must be deterministic for a fixed model.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
