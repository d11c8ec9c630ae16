//! 刚体物理后端（rapier3d）
//!
//! 每帧流程：[update_from_bone → step_simulation → update_bone]
//! - 运动学刚体：步进前由骨骼驱动，步进后不写回
//! - 动态刚体：步进后把旋转和位置写回骨骼
//! - 动态跟骨刚体：步进后只写回旋转，然后把刚体位置钉回骨骼
//!
//! 刚体尺寸按模型缩放 1 设计。模型缩放不为 1 时，
//! 更新期间临时去掉父变换并把缩放强制为 1，结束后恢复。

mod body;
mod joint;
mod world;

pub use body::{bullet_damping, isometry_to_mat4, mat4_to_isometry, MmdRigidBody};
pub use joint::{AxisLimit, Constraint};
pub use world::{PhysicsWorld, SubstepPolicy};

use glam::{Mat4, Vec3};

use crate::physics::config::{get_config, PhysicsConfig};
use crate::physics::helpers::{HelperColor, HelperLine, HelperShape, HelperShapeKind, PhysicsHelpers};
use crate::physics::params::{JointParam, PhysicsMode, RigidBodyParam, RigidBodyShape};
use crate::physics::pool::ResourcePool;
use crate::skeleton::{BoneSet, ModelTransform};

/// 预热时每次更新的时长
const WARMUP_DELTA: f32 = 1.0 / 60.0;

/// 刚体物理后端
pub struct RigidBodyPhysics {
    /// 关节先于刚体先于世界
    constraints: Vec<Constraint>,
    bodies: Vec<MmdRigidBody>,
    world: PhysicsWorld,
    pool: ResourcePool,
    config: PhysicsConfig,
    /// 写回骨骼的顺序（按骨骼深度，父骨骼在前）
    sync_order: Vec<usize>,
}

impl RigidBodyPhysics {
    /// 使用全局配置创建
    pub fn new(skeleton: &mut BoneSet, rigid_bodies: &[RigidBodyParam], joints: &[JointParam]) -> Self {
        Self::with_config(skeleton, rigid_bodies, joints, get_config())
    }

    /// 创建刚体和关节
    ///
    /// 构建期间模型根变换临时重置为单位变换，
    /// 使模型局部空间的刚体参数与骨骼世界矩阵处于同一空间。
    pub fn with_config(
        skeleton: &mut BoneSet,
        rigid_bodies: &[RigidBodyParam],
        joints: &[JointParam],
        config: PhysicsConfig,
    ) -> Self {
        let mut physics = skeleton.with_model_transform(ModelTransform::default(), |sk| {
            Self::build(sk, rigid_bodies, joints, config)
        });
        physics.reset(skeleton);
        physics
    }

    fn build(
        skeleton: &mut BoneSet,
        rigid_bodies: &[RigidBodyParam],
        joints: &[JointParam],
        config: PhysicsConfig,
    ) -> Self {
        let mut world = PhysicsWorld::new(&config);

        let mut bodies = Vec::with_capacity(rigid_bodies.len());
        for param in rigid_bodies {
            let mut body = MmdRigidBody::from_param(param, skeleton);
            body.insert_into(&mut world, param, &config);
            bodies.push(body);
        }

        let mut constraints = Vec::new();
        if config.joints_enabled {
            constraints.reserve(joints.len());
            for param in joints {
                let Some((a, b)) = resolve_pair(param, &bodies) else {
                    log::debug!(
                        "[关节] '{}' 引用的刚体 {} / {} 无效，跳过",
                        param.name, param.rigid_body_a_index, param.rigid_body_b_index
                    );
                    continue;
                };
                let (Some(handle_a), Some(handle_b)) = (bodies[a].handle, bodies[b].handle) else {
                    continue;
                };
                let mut constraint =
                    Constraint::new(param, a, b, bodies[a].initial_world, bodies[b].initial_world);
                constraint.handle = Some(world.insert_joint(handle_a, handle_b, constraint.build_joint(&config)));
                constraints.push(constraint);
            }
        }

        // 被物理接管的骨骼
        for bone in bodies.iter().filter(|b| b.governs_bone()).filter_map(|b| b.bone_index) {
            if let Some(link) = skeleton.get_bone_mut(bone) {
                link.set_physics_driven(true);
            }
        }

        let mut sync_order: Vec<usize> = (0..bodies.len()).filter(|&i| bodies[i].governs_bone()).collect();
        sync_order.sort_by_key(|&i| bodies[i].bone_index.map_or(0, |bone| skeleton.depth(bone)));

        let count = |mode: PhysicsMode| bodies.iter().filter(|b| b.is_simulated() && b.mode == mode).count();
        log::info!(
            "[刚体] 物理构建完成: {} 刚体 ({}跟骨 + {}物理 + {}物理跟骨), {} 关节",
            world.body_count(),
            count(PhysicsMode::Kinematic),
            count(PhysicsMode::Dynamic),
            count(PhysicsMode::DynamicPinned),
            constraints.len()
        );

        Self {
            constraints,
            bodies,
            world,
            pool: ResourcePool::with_capacity(8),
            config,
            sync_order,
        }
    }

    /// 推进一帧
    pub fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        self.with_unit_scale(skeleton, |physics, sk| physics.step_synced(sk, delta));
    }

    fn step_synced(&mut self, skeleton: &mut BoneSet, delta: f32) {
        for body in &self.bodies {
            body.update_from_bone(&mut self.world, skeleton, &self.pool);
        }

        let steps = self.world.step_simulation(delta);

        for &i in &self.sync_order {
            self.bodies[i].update_bone(&mut self.world, skeleton, &self.pool);
        }

        if self.config.debug_log {
            log::debug!("[刚体] delta={:.4}s, 子步 {}", delta, steps);
        }
    }

    /// 模型缩放不为 1 时，去掉父变换并强制缩放为 1 后执行 `f`
    fn with_unit_scale<R>(&mut self, skeleton: &mut BoneSet, f: impl FnOnce(&mut Self, &mut BoneSet) -> R) -> R {
        if skeleton.root.has_unit_scale() {
            return f(self, skeleton);
        }
        let normalized = ModelTransform { scale: Vec3::ONE, parent: None, ..skeleton.root };
        skeleton.with_model_transform(normalized, |sk| f(self, sk))
    }

    /// 所有刚体回到骨骼上并清零速度
    pub fn reset(&mut self, skeleton: &mut BoneSet) {
        self.with_unit_scale(skeleton, |physics, sk| {
            for body in &physics.bodies {
                body.reset(&mut physics.world, sk, &physics.pool);
            }
        });
    }

    /// 预热：以 1/60 秒连续更新 `cycles` 次，让刚体落到平衡位置
    pub fn warmup(&mut self, skeleton: &mut BoneSet, cycles: usize) {
        for _ in 0..cycles {
            self.update(skeleton, WARMUP_DELTA);
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.world.set_gravity(gravity);
    }

    pub fn gravity(&self) -> Vec3 {
        self.world.gravity()
    }

    pub fn bodies(&self) -> &[MmdRigidBody] {
        &self.bodies
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// 上一次更新执行的子步数
    pub fn last_substeps(&self) -> usize {
        self.world.last_substeps()
    }

    /// 刚体当前世界变换（不在物理世界中时返回 None）
    pub fn body_world_transform(&self, index: usize) -> Option<Mat4> {
        self.bodies.get(index)?.world_transform(&self.world)
    }

    /// 调试线框：每个刚体一个形状，每个关节一条线
    pub fn create_helpers(&self) -> PhysicsHelpers {
        let mut helpers = PhysicsHelpers::default();

        for (index, body) in self.bodies.iter().enumerate() {
            let (Some(shape), Some(transform)) = (body.shape, body.world_transform(&self.world)) else {
                continue;
            };
            let kind = match shape {
                RigidBodyShape::Sphere => HelperShapeKind::Sphere { radius: body.size[0] },
                RigidBodyShape::Box => HelperShapeKind::Box { half_extents: Vec3::from_array(body.size) },
                RigidBodyShape::Capsule => HelperShapeKind::Capsule { radius: body.size[0], height: body.size[1] },
            };
            let color = match body.mode {
                PhysicsMode::Kinematic => HelperColor::KINEMATIC,
                PhysicsMode::Dynamic => HelperColor::DYNAMIC,
                PhysicsMode::DynamicPinned => HelperColor::DYNAMIC_PINNED,
            };
            helpers.shapes.push(HelperShape { source_index: index, kind, transform, color });
        }

        for constraint in &self.constraints {
            let (Some(a), Some(b)) = (
                self.body_world_transform(constraint.body_a),
                self.body_world_transform(constraint.body_b),
            ) else {
                continue;
            };
            helpers.lines.push(HelperLine {
                start: a.w_axis.truncate(),
                end: b.w_axis.truncate(),
                color: HelperColor::JOINT,
            });
        }

        helpers
    }

    /// 释放物理世界并清除骨骼的物理接管标志
    pub fn dispose(mut self, skeleton: &mut BoneSet) {
        for constraint in self.constraints.drain(..) {
            if let Some(handle) = constraint.handle {
                self.world.remove_joint(handle);
            }
        }
        for body in self.bodies.drain(..) {
            if body.governs_bone() {
                if let Some(link) = body.bone_index.and_then(|bone| skeleton.get_bone_mut(bone)) {
                    link.set_physics_driven(false);
                }
            }
            if let Some(handle) = body.handle {
                self.world.remove_body(handle);
            }
        }
        log::info!("[刚体] 物理世界已释放");
    }
}

/// 关节两端刚体索引，越界或相同时返回 None
fn resolve_pair(param: &JointParam, bodies: &[MmdRigidBody]) -> Option<(usize, usize)> {
    let a = usize::try_from(param.rigid_body_a_index).ok()?;
    let b = usize::try_from(param.rigid_body_b_index).ok()?;
    (a < bodies.len() && b < bodies.len() && a != b).then_some((a, b))
}
