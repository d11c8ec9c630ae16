//! MMD Dynamics - MMD 模型的二次运动物理
//!
//! 让物理模拟与动画骨骼保持同步：
//! - 刚体后端（rapier3d）：运动学/动态/动态跟骨三种刚体模式 + 6DOF 弹簧关节
//! - 弹簧骨后端：按骨骼名称生成碰撞体和弹簧关节，轻量模拟头发/裙子
//! - 可插拔策略：模型外壳只依赖 `PhysicsStrategy`，不依赖具体后端

pub mod model;
pub mod physics;
pub mod skeleton;

pub use model::MmdModel;
pub use physics::{
    Physics, PhysicsBackend, PhysicsConfig, PhysicsHelpers, PhysicsStrategy, ResourcePool,
    SpringBonePhysics,
};
#[cfg(feature = "rapier")]
pub use physics::RigidBodyPhysics;
pub use skeleton::{Bone, BoneFlags, BoneLink, BoneSet, ModelTransform};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MmdError {
    #[error("Physics backend unavailable: {0}")]
    BackendUnavailable(&'static str),

    #[error("Unsupported rigid body shape type: {0}")]
    UnsupportedShape(u8),

    #[error("Unknown physics mode: {0}")]
    UnknownPhysicsMode(u8),

    #[error("Bone index {index} out of range (count={count})")]
    InvalidBoneIndex { index: i32, count: usize },
}

pub type Result<T> = std::result::Result<T, MmdError>;
