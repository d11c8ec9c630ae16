//! 弹簧骨关节
//!
//! 父骨骼 → 子骨骼的一条边。尾端（子骨骼世界位置）用 Verlet 积分：
//!
//! ```text
//! next = cur + (cur - prev) * (1 - drag) + axis * stiffness * dt + gravity_dir * gravity_power * dt
//! ```
//!
//! 然后拉回骨长、推出碰撞体，最后把父骨骼旋转到指向新尾端。

use glam::{Mat4, Quat, Vec3};

use crate::skeleton::BoneSet;

use super::collider::SpringCollider;

/// 关节参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringJointSettings {
    /// 回到静止方向的力度
    pub stiffness: f32,
    /// 速度衰减（0~1）
    pub drag_force: f32,
    /// 重力强度（None 表示未配置，按 0 处理，缩放时不参与）
    pub gravity_power: Option<f32>,
    pub gravity_dir: Vec3,
    /// 尾端碰撞半径
    pub hit_radius: f32,
}

impl Default for SpringJointSettings {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            drag_force: 0.4,
            gravity_power: None,
            gravity_dir: Vec3::NEG_Y,
            hit_radius: 0.0,
        }
    }
}

/// 静止状态（set_init_state 时捕获）
#[derive(Debug, Clone, Copy, Default)]
struct RestState {
    local_matrix: Mat4,
    local_rotation: Quat,
    /// 子骨骼在父骨骼局部空间的位置
    local_child_position: Vec3,
    /// 局部空间的骨骼方向
    bone_axis: Vec3,
}

/// 弹簧关节
#[derive(Debug, Clone)]
pub struct SpringJoint {
    pub bone: usize,
    pub child: usize,
    pub settings: SpringJointSettings,
    /// 可碰撞的碰撞体索引
    pub colliders: Vec<usize>,
    /// 缩放为 1 时的参数
    base: SpringJointSettings,
    rest: RestState,
    current_tail: Vec3,
    prev_tail: Vec3,
}

impl SpringJoint {
    pub fn new(bone: usize, child: usize, settings: SpringJointSettings) -> Self {
        Self {
            bone,
            child,
            settings,
            colliders: Vec::new(),
            base: settings,
            rest: RestState::default(),
            current_tail: Vec3::ZERO,
            prev_tail: Vec3::ZERO,
        }
    }

    pub fn with_colliders(mut self, colliders: Vec<usize>) -> Self {
        self.colliders = colliders;
        self
    }

    pub fn base_settings(&self) -> SpringJointSettings {
        self.base
    }

    /// 尾端当前世界位置
    pub fn current_tail(&self) -> Vec3 {
        self.current_tail
    }

    /// 碰撞半径与重力从基准值重新计算
    pub fn rescale(&mut self, factor: f32) {
        self.settings.hit_radius = self.base.hit_radius * factor;
        if let Some(gravity) = self.base.gravity_power {
            self.settings.gravity_power = Some(gravity * factor);
        }
    }

    /// 以骨骼当前姿态为静止状态
    pub fn set_init_state(&mut self, skeleton: &BoneSet) {
        let (Some(bone), Some(child)) = (skeleton.get_bone(self.bone), skeleton.get_bone(self.child)) else {
            return;
        };
        let local_child_position = child.position;
        self.rest = RestState {
            local_matrix: bone.local_transform(),
            local_rotation: bone.rotation,
            local_child_position,
            bone_axis: local_child_position.try_normalize().unwrap_or(Vec3::Y),
        };
        self.current_tail = skeleton.world_matrix(self.bone).transform_point3(local_child_position);
        self.prev_tail = self.current_tail;
    }

    /// 推进一步并写回父骨骼旋转（调用方负责刷新子树）
    pub fn update(&mut self, skeleton: &mut BoneSet, colliders: &[SpringCollider], delta: f32) {
        if delta <= 0.0 {
            return;
        }

        let bone_world = skeleton.world_matrix(self.bone);
        let parent_world = skeleton.parent_world_matrix(self.bone);
        let world_position = bone_world.w_axis.truncate();
        let bone_length = (bone_world.transform_point3(self.rest.local_child_position) - world_position).length();

        let world_axis = (parent_world * self.rest.local_matrix)
            .transform_vector3(self.rest.bone_axis)
            .normalize_or_zero();

        let s = &self.settings;
        let inertia = (self.current_tail - self.prev_tail) * (1.0 - s.drag_force);
        let mut next_tail = self.current_tail
            + inertia
            + world_axis * s.stiffness * delta
            + s.gravity_dir * s.gravity_power.unwrap_or(0.0) * delta;

        next_tail = world_position + (next_tail - world_position).normalize_or_zero() * bone_length;

        for collider in self.colliders.iter().filter_map(|&i| colliders.get(i)) {
            let matrix = collider.world_matrix(skeleton);
            let (distance, direction) = collider.shape.collide(matrix, next_tail, s.hit_radius);
            if distance < 0.0 {
                next_tail -= direction * distance;
                next_tail = world_position + (next_tail - world_position).normalize_or_zero() * bone_length;
            }
        }

        self.prev_tail = self.current_tail;
        self.current_tail = next_tail;

        let to = (parent_world * self.rest.local_matrix)
            .inverse()
            .transform_point3(next_tail)
            .normalize_or_zero();
        if to == Vec3::ZERO {
            return;
        }
        let rotation = self.rest.local_rotation * Quat::from_rotation_arc(self.rest.bone_axis, to);
        if let Some(link) = skeleton.get_bone_mut(self.bone) {
            link.rotation = rotation.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::spring_bone::collider::ColliderShape;
    use crate::skeleton::BoneLink;

    fn chain() -> BoneSet {
        let mut set = BoneSet::new();
        set.add_bone(BoneLink::new("髪").with_position(Vec3::new(0.0, 10.0, 0.0)));
        set.add_bone(BoneLink::new("髪先").with_parent(0).with_position(Vec3::new(1.0, 10.0, 0.0)));
        set.build_hierarchy();
        set
    }

    #[test]
    fn test_gravity_pulls_tail_down() {
        let mut set = chain();
        let settings = SpringJointSettings {
            stiffness: 0.0,
            drag_force: 0.5,
            gravity_power: Some(5.0),
            ..Default::default()
        };
        let mut joint = SpringJoint::new(0, 1, settings);
        joint.set_init_state(&set);

        for _ in 0..10 {
            joint.update(&mut set, &[], 1.0 / 60.0);
            set.update_subtree(0);
        }

        let tip = set.world_position(1);
        assert!(tip.y < 10.0);
        // 骨长保持不变
        assert!((tip.distance(set.world_position(0)) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_collider_pushes_tail_out() {
        let mut set = chain();
        let settings = SpringJointSettings { stiffness: 0.0, drag_force: 1.0, hit_radius: 0.1, ..Default::default() };
        // 以尾端为中心的球，尾端被推到球外
        let colliders = [SpringCollider::new(
            "ball",
            0,
            ColliderShape::Sphere { offset: Vec3::new(1.0, -0.2, 0.0), radius: 0.3 },
        )];
        let mut joint = SpringJoint::new(0, 1, settings).with_colliders(vec![0]);
        joint.set_init_state(&set);
        joint.update(&mut set, &colliders, 1.0 / 60.0);

        let center = Vec3::new(1.0, 9.8, 0.0);
        assert!(joint.current_tail().distance(center) > 0.3);
        assert!(joint.current_tail().y > 10.0);
    }

    #[test]
    fn test_rescale_is_idempotent() {
        let settings = SpringJointSettings { hit_radius: 0.15, gravity_power: Some(1.0), ..Default::default() };
        let mut joint = SpringJoint::new(0, 1, settings);
        joint.rescale(2.0);
        let once = joint.settings;
        joint.rescale(2.0);
        assert_eq!(joint.settings, once);
        assert_eq!(once.hit_radius, 0.3);
        assert_eq!(once.gravity_power, Some(2.0));
    }

    #[test]
    fn test_zero_delta_does_nothing() {
        let mut set = chain();
        let mut joint = SpringJoint::new(0, 1, SpringJointSettings { gravity_power: Some(10.0), ..Default::default() });
        joint.set_init_state(&set);
        joint.update(&mut set, &[], 0.0);
        assert_eq!(set.get_bone(0).unwrap().rotation, Quat::IDENTITY);
    }
}
