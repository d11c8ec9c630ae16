//! MMD 物理系统模块
//!
//! 两个可互换的后端：
//!
//! | 后端 | 实现 |
//! |------|------|
//! | 刚体 | rapier3d 刚体 + 6DOF 弹簧关节（`rapier` feature） |
//! | 弹簧骨 | 按骨骼名称生成的 Verlet 弹簧关节 + 球/胶囊碰撞体 |
//!
//! 二者都实现 `PhysicsStrategy`，由 `Physics` 枚举统一分发。

pub mod config;
pub mod helpers;
pub mod params;
pub mod pool;
#[cfg(feature = "rapier")]
pub mod rigid_body;
pub mod spring_bone;
mod strategy;

pub use config::{get_config, reset_config, set_config, PhysicsConfig};
pub use helpers::{HelperColor, HelperLine, HelperShape, HelperShapeKind, PhysicsHelpers};
pub use params::{JointParam, PhysicsMode, RigidBodyParam, RigidBodyShape};
pub use pool::{Pooled, ResourcePool};
#[cfg(feature = "rapier")]
pub use rigid_body::RigidBodyPhysics;
pub use spring_bone::{BoneNamePatterns, SpringBonePhysics};
pub use strategy::{Physics, PhysicsBackend, PhysicsStrategy};
