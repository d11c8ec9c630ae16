//! 物理策略
//!
//! 模型外壳只依赖 `PhysicsStrategy`，后端在加载模型时选定一次：
//! 默认弹簧骨，可替换为刚体或不做物理。

use crate::physics::config::PhysicsConfig;
use crate::physics::helpers::PhysicsHelpers;
use crate::physics::params::{JointParam, RigidBodyParam};
#[cfg(feature = "rapier")]
use crate::physics::rigid_body::RigidBodyPhysics;
use crate::physics::spring_bone::{BoneNamePatterns, SpringBonePhysics};
use crate::skeleton::BoneSet;
use crate::Result;

/// 物理后端的公共接口
pub trait PhysicsStrategy {
    fn name(&self) -> &'static str;

    /// 推进模拟并把结果写入骨骼
    fn update(&mut self, skeleton: &mut BoneSet, delta: f32);

    /// 调试线框（只读快照）
    fn create_helpers(&self, skeleton: &BoneSet) -> PhysicsHelpers;

    /// 按模型缩放系数调整物理尺寸
    fn rescale(&mut self, _skeleton: &mut BoneSet, _factor: f32) {}

    /// 释放后端资源
    fn dispose(self, skeleton: &mut BoneSet)
    where
        Self: Sized;
}

#[cfg(feature = "rapier")]
impl PhysicsStrategy for RigidBodyPhysics {
    fn name(&self) -> &'static str {
        "rigid-body"
    }

    fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        RigidBodyPhysics::update(self, skeleton, delta);
    }

    fn create_helpers(&self, _skeleton: &BoneSet) -> PhysicsHelpers {
        RigidBodyPhysics::create_helpers(self)
    }

    // 刚体尺寸固定在单位缩放下，缩放由 update 内的归一化处理

    fn dispose(self, skeleton: &mut BoneSet) {
        RigidBodyPhysics::dispose(self, skeleton);
    }
}

impl PhysicsStrategy for SpringBonePhysics {
    fn name(&self) -> &'static str {
        "spring-bone"
    }

    fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        SpringBonePhysics::update(self, skeleton, delta);
    }

    fn create_helpers(&self, skeleton: &BoneSet) -> PhysicsHelpers {
        SpringBonePhysics::create_helpers(self, skeleton)
    }

    fn rescale(&mut self, skeleton: &mut BoneSet, factor: f32) {
        SpringBonePhysics::rescale(self, skeleton, factor);
    }

    fn dispose(self, skeleton: &mut BoneSet) {
        SpringBonePhysics::dispose(self, skeleton);
    }
}

/// 当前生效的物理后端
pub enum Physics {
    #[cfg(feature = "rapier")]
    RigidBody(RigidBodyPhysics),
    SpringBone(SpringBonePhysics),
    /// 不做物理
    None,
}

impl PhysicsStrategy for Physics {
    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "rapier")]
            Physics::RigidBody(p) => p.name(),
            Physics::SpringBone(p) => p.name(),
            Physics::None => "none",
        }
    }

    fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        match self {
            #[cfg(feature = "rapier")]
            Physics::RigidBody(p) => PhysicsStrategy::update(p, skeleton, delta),
            Physics::SpringBone(p) => PhysicsStrategy::update(p, skeleton, delta),
            Physics::None => {}
        }
    }

    fn create_helpers(&self, skeleton: &BoneSet) -> PhysicsHelpers {
        match self {
            #[cfg(feature = "rapier")]
            Physics::RigidBody(p) => PhysicsStrategy::create_helpers(p, skeleton),
            Physics::SpringBone(p) => PhysicsStrategy::create_helpers(p, skeleton),
            Physics::None => PhysicsHelpers::default(),
        }
    }

    fn rescale(&mut self, skeleton: &mut BoneSet, factor: f32) {
        match self {
            #[cfg(feature = "rapier")]
            Physics::RigidBody(p) => PhysicsStrategy::rescale(p, skeleton, factor),
            Physics::SpringBone(p) => PhysicsStrategy::rescale(p, skeleton, factor),
            Physics::None => {}
        }
    }

    fn dispose(self, skeleton: &mut BoneSet) {
        match self {
            #[cfg(feature = "rapier")]
            Physics::RigidBody(p) => PhysicsStrategy::dispose(p, skeleton),
            Physics::SpringBone(p) => PhysicsStrategy::dispose(p, skeleton),
            Physics::None => {}
        }
    }
}

#[cfg(feature = "rapier")]
impl From<RigidBodyPhysics> for Physics {
    fn from(p: RigidBodyPhysics) -> Self {
        Physics::RigidBody(p)
    }
}

impl From<SpringBonePhysics> for Physics {
    fn from(p: SpringBonePhysics) -> Self {
        Physics::SpringBone(p)
    }
}

/// 后端选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicsBackend {
    #[default]
    SpringBone,
    RigidBody,
    None,
}

impl PhysicsBackend {
    /// 从骨骼当前状态创建后端
    ///
    /// 刚体引擎未编译进来时选择刚体后端返回 `BackendUnavailable`。
    pub fn build(
        self,
        skeleton: &mut BoneSet,
        rigid_bodies: &[RigidBodyParam],
        joints: &[JointParam],
        config: &PhysicsConfig,
    ) -> Result<Physics> {
        match self {
            PhysicsBackend::SpringBone => Ok(Physics::SpringBone(SpringBonePhysics::with_config(
                skeleton,
                rigid_bodies,
                config.clone(),
                BoneNamePatterns::default(),
            ))),
            PhysicsBackend::RigidBody => build_rigid_body(skeleton, rigid_bodies, joints, config),
            PhysicsBackend::None => Ok(Physics::None),
        }
    }
}

#[cfg(feature = "rapier")]
fn build_rigid_body(
    skeleton: &mut BoneSet,
    rigid_bodies: &[RigidBodyParam],
    joints: &[JointParam],
    config: &PhysicsConfig,
) -> Result<Physics> {
    Ok(Physics::RigidBody(RigidBodyPhysics::with_config(skeleton, rigid_bodies, joints, config.clone())))
}

#[cfg(not(feature = "rapier"))]
fn build_rigid_body(
    _skeleton: &mut BoneSet,
    _rigid_bodies: &[RigidBodyParam],
    _joints: &[JointParam],
    _config: &PhysicsConfig,
) -> Result<Physics> {
    Err(crate::MmdError::BackendUnavailable("rapier3d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneLink;
    use glam::Vec3;

    fn skeleton() -> BoneSet {
        let mut set = BoneSet::new();
        set.add_bone(BoneLink::new("髪").with_position(Vec3::new(0.0, 10.0, 0.0)));
        set.add_bone(BoneLink::new("髪先").with_parent(0).with_position(Vec3::new(0.0, 9.0, 0.0)));
        set.build_hierarchy();
        set
    }

    #[test]
    fn test_default_backend_is_spring_bone() {
        let mut sk = skeleton();
        let physics = PhysicsBackend::default().build(&mut sk, &[], &[], &PhysicsConfig::default()).unwrap();
        assert_eq!(physics.name(), "spring-bone");
    }

    #[test]
    fn test_none_backend_does_nothing() {
        let mut sk = skeleton();
        let mut physics = PhysicsBackend::None.build(&mut sk, &[], &[], &PhysicsConfig::default()).unwrap();
        let before = sk.bones().to_vec();
        physics.update(&mut sk, 1.0);
        physics.rescale(&mut sk, 2.0);
        assert_eq!(physics.name(), "none");
        assert!(physics.create_helpers(&sk).is_empty());
        assert!(sk.bones().iter().zip(&before).all(|(a, b)| a.rotation == b.rotation && a.position == b.position));
    }

    #[cfg(feature = "rapier")]
    #[test]
    fn test_rigid_body_backend() {
        let mut sk = skeleton();
        let physics = PhysicsBackend::RigidBody.build(&mut sk, &[], &[], &PhysicsConfig::default()).unwrap();
        assert_eq!(physics.name(), "rigid-body");
        physics.dispose(&mut sk);
    }

    #[cfg(not(feature = "rapier"))]
    #[test]
    fn test_rigid_body_backend_unavailable() {
        let mut sk = skeleton();
        let result = PhysicsBackend::RigidBody.build(&mut sk, &[], &[], &PhysicsConfig::default());
        assert!(matches!(result, Err(crate::MmdError::BackendUnavailable(_))));
    }
}
