//! 模型物理外壳
//!
//! 每个加载的模型持有一个物理策略实例。动画层每帧先写好骨骼姿态，
//! 再调用 `update(delta)`；用户缩放模型时调用 `set_scale`。

use glam::Vec3;

use crate::physics::{
    get_config, JointParam, Physics, PhysicsBackend, PhysicsConfig, PhysicsHelpers, PhysicsStrategy,
    RigidBodyParam,
};
use crate::skeleton::{BoneSet, ModelTransform};
use crate::Result;

/// 带物理的 MMD 模型
pub struct MmdModel {
    pub name: String,
    pub skeleton: BoneSet,
    pub rigid_bodies: Vec<RigidBodyParam>,
    pub joints: Vec<JointParam>,
    /// 用户可见的统一缩放
    scale: f32,
    physics: Option<Physics>,
}

impl MmdModel {
    /// 创建模型（不带物理）
    pub fn new(
        name: impl Into<String>,
        mut skeleton: BoneSet,
        rigid_bodies: Vec<RigidBodyParam>,
        joints: Vec<JointParam>,
    ) -> Self {
        skeleton.update_world_matrices();
        Self {
            name: name.into(),
            skeleton,
            rigid_bodies,
            joints,
            scale: 1.0,
            physics: None,
        }
    }

    /// 创建模型并用全局配置构建物理后端
    pub fn with_backend(
        name: impl Into<String>,
        skeleton: BoneSet,
        rigid_bodies: Vec<RigidBodyParam>,
        joints: Vec<JointParam>,
        backend: PhysicsBackend,
    ) -> Result<Self> {
        let mut model = Self::new(name, skeleton, rigid_bodies, joints);
        model.set_backend(backend, &get_config())?;
        Ok(model)
    }

    /// 切换物理后端：先释放旧后端，再从当前骨骼状态构建新后端
    ///
    /// 新后端在单位缩放下构建，然后按当前缩放调整。
    pub fn set_backend(&mut self, backend: PhysicsBackend, config: &PhysicsConfig) -> Result<()> {
        self.dispose_physics();

        let scale = self.scale;
        let unit = ModelTransform { scale: Vec3::ONE, ..self.skeleton.root };
        let (rigid_bodies, joints) = (&self.rigid_bodies, &self.joints);
        let mut physics = self
            .skeleton
            .with_model_transform(unit, |sk| backend.build(sk, rigid_bodies, joints, config))?;

        if scale != 1.0 {
            physics.rescale(&mut self.skeleton, scale);
        }
        log::info!("[模型] '{}' 使用物理后端: {}", self.name, physics.name());
        self.physics = Some(physics);
        Ok(())
    }

    /// 直接注入已构建的后端（释放旧后端）
    pub fn set_physics(&mut self, physics: impl Into<Physics>) {
        self.dispose_physics();
        self.physics = Some(physics.into());
    }

    /// 推进物理（动画姿态必须已写入骨骼）
    pub fn update(&mut self, delta: f32) {
        if let Some(physics) = self.physics.as_mut() {
            physics.update(&mut self.skeleton, delta);
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// 设置模型统一缩放，缩放不变时什么也不做
    pub fn set_scale(&mut self, scale: f32) {
        if self.scale == scale {
            return;
        }
        self.scale = scale;
        self.skeleton.root.scale = Vec3::splat(scale);
        self.skeleton.update_world_matrices();
        if let Some(physics) = self.physics.as_mut() {
            physics.rescale(&mut self.skeleton, scale);
        }
    }

    /// 调试线框（无物理时返回 None）
    pub fn create_helpers(&self) -> Option<PhysicsHelpers> {
        self.physics.as_ref().map(|p| p.create_helpers(&self.skeleton))
    }

    pub fn physics(&self) -> Option<&Physics> {
        self.physics.as_ref()
    }

    pub fn physics_name(&self) -> &'static str {
        self.physics.as_ref().map_or("none", |p| p.name())
    }

    /// 释放物理后端
    pub fn dispose_physics(&mut self) {
        if let Some(physics) = self.physics.take() {
            physics.dispose(&mut self.skeleton);
        }
    }
}

impl Drop for MmdModel {
    fn drop(&mut self) {
        self.dispose_physics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::spring_bone::{BoneNamePatterns, SpringBonePhysics};
    use crate::skeleton::BoneLink;

    fn skeleton() -> BoneSet {
        let mut set = BoneSet::new();
        let center = set.add_bone(BoneLink::new("センター").with_position(Vec3::new(0.0, 8.0, 0.0)));
        let leg = set.add_bone(BoneLink::new("左足").with_parent(center).with_position(Vec3::new(1.0, 10.0, 0.0)));
        set.add_bone(BoneLink::new("左ひざ").with_parent(leg).with_position(Vec3::new(1.0, 5.0, 0.0)));
        let skirt = set.add_bone(BoneLink::new("スカート").with_parent(center).with_position(Vec3::new(0.0, 10.0, 1.0)));
        set.add_bone(BoneLink::new("スカート先").with_parent(skirt).with_position(Vec3::new(0.0, 7.0, 1.5)));
        set.build_hierarchy();
        set
    }

    fn model(backend: PhysicsBackend) -> MmdModel {
        let mut model = MmdModel::new("test", skeleton(), Vec::new(), Vec::new());
        model.set_backend(backend, &PhysicsConfig::default()).unwrap();
        model
    }

    #[test]
    fn test_default_model_uses_spring_bone() {
        let mut m = model(PhysicsBackend::default());
        assert_eq!(m.physics_name(), "spring-bone");
        m.update(1.0 / 60.0);
        let helpers = m.create_helpers().unwrap();
        assert_eq!(helpers.lines.len(), 1);
    }

    #[test]
    fn test_no_physics_has_no_helpers() {
        let m = MmdModel::new("bare", skeleton(), Vec::new(), Vec::new());
        assert!(m.create_helpers().is_none());
        assert_eq!(m.physics_name(), "none");
    }

    #[test]
    fn test_set_scale_rescales_once() {
        let mut m = model(PhysicsBackend::SpringBone);
        m.set_scale(2.0);
        m.set_scale(2.0);
        let Some(Physics::SpringBone(p)) = m.physics() else {
            panic!("expected spring bone backend");
        };
        assert_eq!(p.scale(), 2.0);
        for c in p.colliders() {
            assert_eq!(c.shape.radius(), c.base_shape().radius() * 2.0);
        }
        assert!(m.skeleton.world_position(0).abs_diff_eq(Vec3::new(0.0, 16.0, 0.0), 1e-4));
    }

    #[test]
    fn test_backend_built_at_unit_scale_then_rescaled() {
        let mut m = MmdModel::new("scaled", skeleton(), Vec::new(), Vec::new());
        m.set_scale(3.0);
        m.set_backend(PhysicsBackend::SpringBone, &PhysicsConfig::default()).unwrap();
        let Some(Physics::SpringBone(p)) = m.physics() else {
            panic!("expected spring bone backend");
        };
        // 基准值在单位缩放下生成：左足 骨长 5
        let leg = p.colliders().iter().find(|c| c.bone == 1).unwrap();
        assert!((leg.base_shape().radius() - 0.6).abs() < 1e-5);
        assert!((leg.shape.radius() - 1.8).abs() < 1e-5);
        assert_eq!(m.skeleton.root.scale, Vec3::splat(3.0));
    }

    #[test]
    fn test_swap_disposes_old_backend() {
        let mut m = model(PhysicsBackend::SpringBone);
        assert!(m.skeleton.get_bone(3).unwrap().is_physics_driven());
        m.set_backend(PhysicsBackend::None, &PhysicsConfig::default()).unwrap();
        assert_eq!(m.physics_name(), "none");
        assert!(!m.skeleton.get_bone(3).unwrap().is_physics_driven());
    }

    #[test]
    fn test_inject_custom_strategy() {
        let mut m = model(PhysicsBackend::None);
        let physics = SpringBonePhysics::with_config(
            &mut m.skeleton,
            &[],
            PhysicsConfig::default(),
            BoneNamePatterns::empty(),
        );
        m.set_physics(physics);
        assert_eq!(m.physics_name(), "spring-bone");
        assert!(m.create_helpers().unwrap().is_empty());
    }

    #[cfg(feature = "rapier")]
    #[test]
    fn test_rigid_body_backend_on_model() {
        let bodies = vec![RigidBodyParam {
            name: "skirt".into(),
            bone_index: 3,
            group_mask: 0,
            position: [0.0, 9.0, 1.2],
            physics_mode: 1,
            ..Default::default()
        }];
        let mut m = MmdModel::new("rb", skeleton(), bodies, Vec::new());
        m.set_backend(PhysicsBackend::RigidBody, &PhysicsConfig::default()).unwrap();
        assert_eq!(m.physics_name(), "rigid-body");
        let before = m.skeleton.get_bone(3).unwrap().position;
        m.update(1.0 / 30.0);
        assert_ne!(m.skeleton.get_bone(3).unwrap().position, before);
        assert_eq!(m.create_helpers().unwrap().shapes.len(), 1);
    }

    #[cfg(not(feature = "rapier"))]
    #[test]
    fn test_rigid_body_backend_unavailable() {
        let mut m = MmdModel::new("rb", skeleton(), Vec::new(), Vec::new());
        let err = m.set_backend(PhysicsBackend::RigidBody, &PhysicsConfig::default());
        assert_eq!(err, Err(crate::MmdError::BackendUnavailable("rapier3d")));
        assert!(m.physics().is_none());
    }
}
