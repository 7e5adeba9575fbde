use ragchat_core::config::{EmbeddingKind, EmbeddingSettings};
use ragchat_embed::get_default_embedder;

#[test]
fn hash_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingKind::Hash, dim: 1024, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim follows settings");
    assert_eq!(embedder.dim(), 1024);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn related_texts_score_higher_than_unrelated() {
    let settings = EmbeddingSettings { provider: EmbeddingKind::Hash, dim: 256, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let q = embedder.embed("rust borrow checker").unwrap();
    let near = embedder.embed("the rust borrow checker rejects aliasing").unwrap();
    let far = embedder.embed("sourdough bread recipe").unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}
