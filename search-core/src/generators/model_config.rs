//! `ModelConfigGenerator`: the server-side configuration sweep — automatic
//! instance-count sweep, manual Cartesian product, or the `Default`-only
//! sweep in remote mode — plus `cpu_only` instance-kind selection.

use search_types::{
    DynamicBatchingConfig, InstanceGroup, InstanceKind, ModelConfigVariant, RunConfigMeasurement,
    ServerConfig,
};

use super::ConfigGenerator;

pub struct ModelConfigGenerator {
    variants: Vec<ModelConfigVariant>,
    cursor: usize,
}

impl ModelConfigGenerator {
    /// Automatic mode: `instance_count` in `[1, max_instance_count]`, each
    /// paired with dynamic batching enabled at defaults, plus the trailing
    /// `Default` sentinel.
    pub fn automatic(max_instance_count: u32, max_batch_size: u32, cpu_only: bool) -> Self {
        let kind = if cpu_only { InstanceKind::Cpu } else { InstanceKind::Gpu };
        let mut variants = Vec::new();
        for instance_count in 1..=max_instance_count.max(1) {
            variants.push(ModelConfigVariant::Explicit(ServerConfig {
                max_batch_size,
                instance_group: vec![InstanceGroup {
                    count: instance_count,
                    kind,
                    rate_limiter_priority: None,
                }],
                dynamic_batching: Some(DynamicBatchingConfig::default()),
                passthrough: Default::default(),
            }));
        }
        variants.push(ModelConfigVariant::Default);
        Self { variants, cursor: 0 }
    }

    /// Manual mode: the user-specified server config variants (already
    /// expanded into a flat product by the `search-cli` config layer), plus
    /// the trailing `Default` sentinel if not already present.
    pub fn manual(explicit: Vec<ServerConfig>) -> Self {
        let mut variants: Vec<ModelConfigVariant> =
            explicit.into_iter().map(ModelConfigVariant::Explicit).collect();
        if !variants.contains(&ModelConfigVariant::Default) {
            variants.push(ModelConfigVariant::Default);
        }
        Self { variants, cursor: 0 }
    }

    /// Remote mode: cannot touch server-side config, so the sweep is the
    /// `Default` sentinel only.
    pub fn remote() -> Self {
        Self {
            variants: vec![ModelConfigVariant::Default],
            cursor: 0,
        }
    }

    pub fn variants(&self) -> &[ModelConfigVariant] {
        &self.variants
    }
}

impl ConfigGenerator for ModelConfigGenerator {
    type Output = ModelConfigVariant;

    fn next_config(&mut self) -> Option<ModelConfigVariant> {
        self.variants.get(self.cursor).cloned()
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.variants.len()
    }

    fn set_last_results(&mut self, _results: &[Option<RunConfigMeasurement>]) {
        self.cursor += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automatic_sweeps_instance_count_and_appends_default() {
        let mut gen = ModelConfigGenerator::automatic(3, 8, false);
        assert_eq!(gen.variants().len(), 4);
        assert!(matches!(gen.variants()[3], ModelConfigVariant::Default));
        let first = gen.next_config().unwrap();
        match first {
            ModelConfigVariant::Explicit(c) => {
                assert_eq!(c.instance_group[0].count, 1);
                assert_eq!(c.instance_group[0].kind, InstanceKind::Gpu);
            }
            _ => panic!("expected explicit variant"),
        }
    }

    #[test]
    fn cpu_only_uses_cpu_instance_kind() {
        let gen = ModelConfigGenerator::automatic(2, 8, true);
        match &gen.variants()[0] {
            ModelConfigVariant::Explicit(c) => assert_eq!(c.instance_group[0].kind, InstanceKind::Cpu),
            _ => panic!("expected explicit variant"),
        }
    }

    #[test]
    fn remote_mode_is_default_only() {
        let gen = ModelConfigGenerator::remote();
        assert_eq!(gen.variants().len(), 1);
        assert!(matches!(gen.variants()[0], ModelConfigVariant::Default));
    }

    #[test]
    fn manual_mode_appends_default_if_missing() {
        let explicit = vec![ServerConfig {
            max_batch_size: 4,
            instance_group: vec![InstanceGroup {
                count: 2,
                kind: InstanceKind::Gpu,
                rate_limiter_priority: None,
            }],
            dynamic_batching: None,
            passthrough: Default::default(),
        }];
        let gen = ModelConfigGenerator::manual(explicit);
        assert_eq!(gen.variants().len(), 2);
        assert!(matches!(gen.variants()[1], ModelConfigVariant::Default));
    }

    #[test]
    fn is_done_once_cursor_exhausted() {
        let mut gen = ModelConfigGenerator::remote();
        assert!(!gen.is_done());
        let _ = gen.next_config();
        gen.set_last_results(&[]);
        assert!(gen.is_done());
        assert!(gen.next_config().is_none());
    }
}
