//! MMD 刚体封装
//!
//! 一个 `MmdRigidBody` 对应 rapier 中的一个刚体 + 一个碰撞体，
//! 并记录它相对于骨骼的固定偏移（构建时在单位模型变换下算一次）。

use glam::{Mat4, Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use crate::physics::config::PhysicsConfig;
use crate::physics::params::{PhysicsMode, RigidBodyParam, RigidBodyShape};
use crate::physics::pool::ResourcePool;
use crate::skeleton::{strip_scale, BoneSet};
use crate::MmdError;

use super::world::PhysicsWorld;

/// MMD 刚体
pub struct MmdRigidBody {
    pub name: String,
    /// 关联骨骼（None 表示纯装饰刚体）
    pub bone_index: Option<usize>,
    pub mode: PhysicsMode,
    /// 形状（None 表示形状无效，刚体不参与模拟）
    pub shape: Option<RigidBodyShape>,
    pub size: [f32; 3],
    pub group: u8,
    pub group_mask: u16,
    pub(crate) handle: Option<RigidBodyHandle>,
    pub(crate) collider_handle: Option<ColliderHandle>,
    /// 刚体相对骨骼的偏移：inverse(boneWorld) * shapeWorld
    pub offset: Mat4,
    pub inv_offset: Mat4,
    /// 构建时的刚体世界变换
    pub initial_world: Mat4,
}

impl MmdRigidBody {
    /// 从参数创建（调用方保证骨骼处于单位模型变换下）
    pub fn from_param(param: &RigidBodyParam, skeleton: &BoneSet) -> Self {
        let shape = match param.shape() {
            Ok(shape) => Some(shape),
            Err(e) => {
                log::warn!("[刚体] '{}': {}，跳过形状创建", param.name, e);
                None
            }
        };

        let bone_index = param.bone().and_then(|idx| {
            if idx < skeleton.bone_count() {
                Some(idx)
            } else {
                let e = MmdError::InvalidBoneIndex { index: param.bone_index, count: skeleton.bone_count() };
                log::warn!("[刚体] '{}': {}，按无骨骼处理", param.name, e);
                None
            }
        });

        let shape_world = Mat4::from_rotation_translation(param.local_rotation(), param.local_position());
        let offset = match bone_index {
            Some(idx) => skeleton.world_matrix(idx).inverse() * shape_world,
            None => shape_world,
        };

        Self {
            name: param.name.clone(),
            bone_index,
            mode: param.mode(),
            shape,
            size: param.size,
            group: param.group,
            group_mask: param.group_mask,
            handle: None,
            collider_handle: None,
            offset,
            inv_offset: offset.inverse(),
            initial_world: shape_world,
        }
    }

    /// 在物理世界中创建刚体和碰撞体；形状无效时什么也不做
    pub fn insert_into(&mut self, world: &mut PhysicsWorld, param: &RigidBodyParam, config: &PhysicsConfig) {
        let Some(shape) = self.shape else {
            return;
        };

        let body_type = match self.mode {
            PhysicsMode::Kinematic => RigidBodyType::KinematicPositionBased,
            PhysicsMode::Dynamic | PhysicsMode::DynamicPinned => RigidBodyType::Dynamic,
        };

        let body = RigidBodyBuilder::new(body_type)
            .position(mat4_to_isometry(self.initial_world))
            .linear_damping(bullet_damping(param.linear_damping) * config.linear_damping_scale)
            .angular_damping(bullet_damping(param.angular_damping) * config.angular_damping_scale)
            .ccd_enabled(false)
            .can_sleep(false)
            .build();

        let shared = match shape {
            RigidBodyShape::Sphere => SharedShape::ball(self.size[0]),
            RigidBodyShape::Box => SharedShape::cuboid(self.size[0], self.size[1], self.size[2]),
            // 胶囊沿 Y 轴，size[1] 为圆柱段长度
            RigidBodyShape::Capsule => SharedShape::capsule_y(self.size[1] * 0.5, self.size[0]),
        };

        let groups = InteractionGroups::new(
            Group::from_bits_truncate(1 << self.group.min(15)),
            Group::from_bits_truncate(self.group_mask as u32),
        );

        let builder = ColliderBuilder::new(shared)
            .friction(param.friction)
            .restitution(param.restitution)
            .collision_groups(groups)
            .solver_groups(groups);
        let builder = if self.mode == PhysicsMode::Kinematic {
            builder.density(0.0)
        } else {
            builder.mass(param.mass * config.mass_scale)
        };

        let (handle, collider_handle) = world.insert_body(body, builder.build());
        self.handle = Some(handle);
        self.collider_handle = Some(collider_handle);
    }

    /// 是否实际存在于物理世界
    #[inline]
    pub fn is_simulated(&self) -> bool {
        self.handle.is_some()
    }

    /// 是否把模拟结果写回骨骼
    #[inline]
    pub fn governs_bone(&self) -> bool {
        self.is_simulated() && self.bone_index.is_some() && self.mode != PhysicsMode::Kinematic
    }

    /// 骨骼当前姿态对应的刚体世界变换
    pub fn target_from_bone(&self, skeleton: &BoneSet, pool: &ResourcePool) -> Option<Mat4> {
        let bone = self.bone_index?;
        let bone_world = pool.alloc_with(strip_scale(skeleton.world_matrix(bone)));
        let target = pool.alloc_with(*bone_world * self.offset);
        Some(target.get())
    }

    /// 当前刚体世界变换
    pub fn world_transform(&self, world: &PhysicsWorld) -> Option<Mat4> {
        let body = world.bodies.get(self.handle?)?;
        Some(isometry_to_mat4(body.position()))
    }

    /// 步进前：运动学刚体跟随骨骼
    pub fn update_from_bone(&self, world: &mut PhysicsWorld, skeleton: &BoneSet, pool: &ResourcePool) {
        if self.mode != PhysicsMode::Kinematic {
            return;
        }
        let (Some(handle), Some(target)) = (self.handle, self.target_from_bone(skeleton, pool)) else {
            return;
        };
        if let Some(body) = world.bodies.get_mut(handle) {
            body.set_next_kinematic_position(mat4_to_isometry(target));
        }
    }

    /// 步进后：把物理结果写回骨骼
    ///
    /// - Kinematic：不写回
    /// - Dynamic：写回旋转和位置
    /// - DynamicPinned：只写回旋转，然后把刚体位置钉回骨骼
    pub fn update_bone(&self, world: &mut PhysicsWorld, skeleton: &mut BoneSet, pool: &ResourcePool) {
        if self.mode == PhysicsMode::Kinematic {
            return;
        }
        let (Some(handle), Some(bone)) = (self.handle, self.bone_index) else {
            return;
        };
        let Some(body) = world.bodies.get(handle) else {
            return;
        };

        let body_world = pool.alloc_with(isometry_to_mat4(body.position()));
        let target = pool.alloc_with(*body_world * self.inv_offset);
        let parent_world = pool.alloc_with(skeleton.parent_world_matrix(bone));

        let (_, target_rot, target_pos) = target.to_scale_rotation_translation();
        let (_, parent_rot, _) = parent_world.to_scale_rotation_translation();
        let mut local_rot = pool.alloc_with(parent_rot.inverse() * target_rot);
        *local_rot = local_rot.normalize();

        let mut local_pos = pool.alloc::<Vec3>();
        if self.mode == PhysicsMode::Dynamic {
            *local_pos = parent_world.inverse().transform_point3(target_pos);
        }

        if let Some(link) = skeleton.get_bone_mut(bone) {
            link.rotation = local_rot.get();
            if self.mode == PhysicsMode::Dynamic {
                link.position = local_pos.get();
            }
        }
        skeleton.update_subtree(bone);

        if self.mode == PhysicsMode::DynamicPinned {
            if let Some(pinned) = self.target_from_bone(skeleton, pool) {
                let t = pinned.w_axis;
                if let Some(body) = world.bodies.get_mut(handle) {
                    body.set_translation(vector![t.x, t.y, t.z], true);
                }
            }
        }
    }

    /// 把刚体放回骨骼（或初始位置）并清零速度
    pub fn reset(&self, world: &mut PhysicsWorld, skeleton: &BoneSet, pool: &ResourcePool) {
        let Some(handle) = self.handle else {
            return;
        };
        let target = self.target_from_bone(skeleton, pool).unwrap_or(self.initial_world);
        let iso = mat4_to_isometry(target);
        if let Some(body) = world.bodies.get_mut(handle) {
            body.set_position(iso, true);
            if self.mode == PhysicsMode::Kinematic {
                body.set_next_kinematic_position(iso);
            }
            body.set_linvel(vector![0.0, 0.0, 0.0], true);
            body.set_angvel(vector![0.0, 0.0, 0.0], true);
        }
    }
}

/// Bullet 阻尼（每秒速度衰减比例 0~1）→ rapier 阻尼系数
///
/// Bullet: v *= (1 - d)^dt；rapier: v *= 1 / (1 + c * dt)，小 dt 下 c ≈ -ln(1 - d)。
#[inline]
pub fn bullet_damping(d: f32) -> f32 {
    -(1.0 - d.clamp(0.0, 1.0)).max(1e-4).ln()
}

/// glam Mat4 → rapier Isometry（忽略缩放）
pub fn mat4_to_isometry(m: Mat4) -> Isometry<Real> {
    let (_, r, t) = m.to_scale_rotation_translation();
    Isometry::from_parts(
        Translation3::new(t.x, t.y, t.z),
        UnitQuaternion::new_normalize(Quaternion::new(r.w, r.x, r.y, r.z)),
    )
}

/// rapier Isometry → glam Mat4
pub fn isometry_to_mat4(iso: &Isometry<Real>) -> Mat4 {
    let t = iso.translation.vector;
    let q = iso.rotation;
    Mat4::from_rotation_translation(Quat::from_xyzw(q.i, q.j, q.k, q.w), Vec3::new(t.x, t.y, t.z))
}
