//! 弹簧骨物理后端
//!
//! 不使用刚体世界，按骨骼名称生成：
//! 1. 头发关节：每条 头发骨骼 → 子骨骼 的边一个关节
//! 2. 腿/躯干碰撞体：有 PMX 刚体时按刚体形状生成，否则按骨长生成默认胶囊
//! 3. 裙子关节：同头发，但可与全部碰撞体碰撞
//!
//! 尺寸在模型缩放 1 下生成并记为基准值，缩放变化时从基准值重新计算。

mod classify;
mod collider;
mod joint;
mod manager;

pub use classify::BoneNamePatterns;
pub use collider::{ColliderShape, SpringCollider};
pub use joint::{SpringJoint, SpringJointSettings};
pub use manager::SpringBoneManager;

use glam::{Mat4, Vec3};

use crate::physics::config::{get_config, PhysicsConfig};
use crate::physics::helpers::{HelperColor, HelperLine, HelperShape, HelperShapeKind, PhysicsHelpers};
use crate::physics::params::{RigidBodyParam, RigidBodyShape};
use crate::skeleton::{BoneSet, ModelTransform};

/// 弹簧骨物理后端
pub struct SpringBonePhysics {
    manager: SpringBoneManager,
    patterns: BoneNamePatterns,
    config: PhysicsConfig,
    scale: f32,
}

impl SpringBonePhysics {
    /// 使用全局配置和默认命名规则创建
    pub fn new(skeleton: &mut BoneSet, rigid_bodies: &[RigidBodyParam]) -> Self {
        Self::with_config(skeleton, rigid_bodies, get_config(), BoneNamePatterns::default())
    }

    pub fn with_config(
        skeleton: &mut BoneSet,
        rigid_bodies: &[RigidBodyParam],
        config: PhysicsConfig,
        patterns: BoneNamePatterns,
    ) -> Self {
        let manager = skeleton.with_model_transform(ModelTransform::default(), |sk| {
            build_manager(sk, rigid_bodies, &config, &patterns)
        });

        for joint in manager.joints() {
            if let Some(link) = skeleton.get_bone_mut(joint.bone) {
                link.set_physics_driven(true);
            }
        }

        let mut physics = Self { manager, patterns, config, scale: 1.0 };
        skeleton.update_world_matrices();
        physics.manager.set_init_state(skeleton);

        log::info!(
            "[弹簧骨] 构建完成: {} 关节, {} 碰撞体",
            physics.manager.joints().len(),
            physics.manager.colliders().len()
        );
        physics
    }

    pub fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        self.manager.update(skeleton, delta);
        if self.config.debug_log {
            log::debug!("[弹簧骨] delta={:.4}s", delta);
        }
    }

    /// 按缩放系数重新计算尺寸（基于基准值，不累乘），然后重新捕获静止状态
    pub fn rescale(&mut self, skeleton: &mut BoneSet, factor: f32) {
        self.scale = factor;
        for joint in self.manager.joints_mut() {
            joint.rescale(factor);
        }
        for collider in self.manager.colliders_mut() {
            collider.rescale(factor);
        }
        skeleton.update_world_matrices();
        skeleton.pose();
        self.manager.set_init_state(skeleton);
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn joints(&self) -> &[SpringJoint] {
        self.manager.joints()
    }

    pub fn colliders(&self) -> &[SpringCollider] {
        self.manager.colliders()
    }

    pub fn patterns(&self) -> &BoneNamePatterns {
        &self.patterns
    }

    /// 调试线框：每个碰撞体一个形状，每个关节一条线（骨骼 → 尾端）
    pub fn create_helpers(&self, skeleton: &BoneSet) -> PhysicsHelpers {
        let mut helpers = PhysicsHelpers::default();

        for (index, collider) in self.manager.colliders().iter().enumerate() {
            let matrix = collider.world_matrix(skeleton);
            let (kind, transform) = match collider.shape {
                ColliderShape::Sphere { offset, radius } => {
                    (HelperShapeKind::Sphere { radius }, matrix * Mat4::from_translation(offset))
                }
                ColliderShape::Capsule { offset, tail, radius } => (
                    HelperShapeKind::Segment {
                        radius,
                        head: matrix.transform_point3(offset),
                        tail: matrix.transform_point3(tail),
                    },
                    matrix,
                ),
            };
            helpers.shapes.push(HelperShape { source_index: index, kind, transform, color: HelperColor::COLLIDER });
        }

        for joint in self.manager.joints() {
            helpers.lines.push(HelperLine {
                start: skeleton.world_position(joint.bone),
                end: joint.current_tail(),
                color: HelperColor::JOINT,
            });
        }

        helpers
    }

    /// 清除骨骼的物理接管标志
    pub fn dispose(self, skeleton: &mut BoneSet) {
        for joint in self.manager.joints() {
            if let Some(link) = skeleton.get_bone_mut(joint.bone) {
                link.set_physics_driven(false);
            }
        }
        log::info!("[弹簧骨] 已释放");
    }
}

fn hair_settings(config: &PhysicsConfig) -> SpringJointSettings {
    SpringJointSettings {
        stiffness: config.hair_stiffness,
        drag_force: config.hair_drag_force,
        gravity_power: config.hair_gravity_power,
        hit_radius: config.hair_hit_radius,
        ..Default::default()
    }
}

fn skirt_settings(config: &PhysicsConfig) -> SpringJointSettings {
    SpringJointSettings {
        stiffness: config.skirt_stiffness,
        drag_force: config.skirt_drag_force,
        gravity_power: config.skirt_gravity_power,
        hit_radius: config.skirt_hit_radius,
        ..Default::default()
    }
}

/// 在单位模型变换下生成关节和碰撞体
fn build_manager(
    skeleton: &BoneSet,
    rigid_bodies: &[RigidBodyParam],
    config: &PhysicsConfig,
    patterns: &BoneNamePatterns,
) -> SpringBoneManager {
    let mut manager = SpringBoneManager::new();

    // 头发
    let mut joints = Vec::new();
    for bone in patterns.hair_bones(skeleton) {
        for &child in skeleton.get_bone(bone).map_or(&[][..], |b| b.children()) {
            joints.push(SpringJoint::new(bone, child, hair_settings(config)));
        }
    }

    // 碰撞体
    let colliders: Vec<usize> = patterns
        .collider_bones(skeleton)
        .into_iter()
        .flat_map(|bone| build_colliders(skeleton, bone, rigid_bodies, config))
        .map(|collider| manager.add_collider(collider))
        .collect();

    // 裙子
    for bone in patterns.skirt_bones(skeleton) {
        for &child in skeleton.get_bone(bone).map_or(&[][..], |b| b.children()) {
            joints.push(SpringJoint::new(bone, child, skirt_settings(config)).with_colliders(colliders.clone()));
        }
    }

    for joint in joints {
        manager.add_joint(joint);
    }
    manager
}

/// 为一根碰撞体骨骼生成碰撞体（无子骨骼时不生成）
fn build_colliders(
    skeleton: &BoneSet,
    bone: usize,
    rigid_bodies: &[RigidBodyParam],
    config: &PhysicsConfig,
) -> Vec<SpringCollider> {
    let Some(link) = skeleton.get_bone(bone) else {
        return Vec::new();
    };
    let Some(&child) = link.children().first() else {
        return Vec::new();
    };
    let child_offset = skeleton.get_bone(child).map_or(Vec3::ZERO, |c| c.position);
    let direction = child_offset.normalize_or_zero();
    let bone_length = skeleton.world_position(child).distance(skeleton.world_position(bone));

    let authored: Vec<&RigidBodyParam> = rigid_bodies.iter().filter(|rb| rb.bone() == Some(bone)).collect();

    if authored.is_empty() {
        let radius = (bone_length * config.default_collider_radius_ratio)
            .min(bone_length * config.default_collider_max_ratio);
        let shape = ColliderShape::Capsule { offset: Vec3::ZERO, tail: direction * bone_length, radius };
        return vec![SpringCollider::new(link.name.clone(), bone, shape)];
    }

    let model = skeleton.model_world_matrix();
    let mut colliders = Vec::with_capacity(authored.len());
    for rb in authored {
        let offset = skeleton.world_to_local(bone, model.transform_point3(rb.local_position()));
        let tail = direction * rb.size[1].min(bone_length);
        let shape = match rb.shape() {
            Ok(RigidBodyShape::Sphere) => {
                ColliderShape::Sphere { offset, radius: rb.size[0] * config.collider_radius_scale }
            }
            Ok(RigidBodyShape::Capsule) => {
                ColliderShape::Capsule { offset, tail, radius: rb.size[0] * config.collider_radius_scale }
            }
            // 盒子按胶囊近似
            Ok(RigidBodyShape::Box) => ColliderShape::Capsule {
                offset,
                tail,
                radius: rb.size[0].max(rb.size[2]) * config.collider_radius_scale,
            },
            Err(e) => {
                log::warn!("[弹簧骨] 刚体 '{}': {}，跳过碰撞体", rb.name, e);
                continue;
            }
        };
        colliders.push(SpringCollider::new(rb.name.clone(), bone, shape));
    }
    colliders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneLink;
    use glam::Quat;

    fn model() -> BoneSet {
        let mut set = BoneSet::new();
        let center = set.add_bone(BoneLink::new("センター").with_position(Vec3::new(0.0, 8.0, 0.0)));
        let leg = set.add_bone(BoneLink::new("右足").with_parent(center).with_position(Vec3::new(-1.0, 10.0, 0.0)));
        set.add_bone(BoneLink::new("右ひざ").with_parent(leg).with_position(Vec3::new(-1.0, 5.0, 0.0)));
        let hair = set.add_bone(BoneLink::new("髪").with_parent(center).with_position(Vec3::new(0.0, 18.0, 0.0)));
        set.add_bone(BoneLink::new("髪先").with_parent(hair).with_position(Vec3::new(0.0, 16.0, -1.0)));
        let skirt = set.add_bone(BoneLink::new("スカート").with_parent(center).with_position(Vec3::new(0.0, 10.0, 1.0)));
        set.add_bone(BoneLink::new("スカート先").with_parent(skirt).with_position(Vec3::new(0.0, 7.0, 1.5)));
        set.build_hierarchy();
        set
    }

    fn still_config() -> PhysicsConfig {
        PhysicsConfig { hair_drag_force: 0.0, hair_gravity_power: None, ..Default::default() }
    }

    #[test]
    fn test_builds_hair_skirt_and_colliders() {
        let mut set = model();
        let physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());

        // 髪 → 髪先, スカート → スカート先
        assert_eq!(physics.joints().len(), 2);
        // センター（子骨骼 右足）和 右足（子骨骼 右ひざ）各一个默认胶囊；右ひざ 无子骨骼
        assert_eq!(physics.colliders().len(), 2);

        let hair = physics.joints().iter().find(|j| j.bone == 3).unwrap();
        assert!(hair.colliders.is_empty());
        let skirt = physics.joints().iter().find(|j| j.bone == 5).unwrap();
        assert_eq!(skirt.colliders, vec![0, 1]);
        assert!(set.get_bone(3).unwrap().is_physics_driven());
    }

    #[test]
    fn test_default_capsule_sized_by_bone_length() {
        let mut set = model();
        let physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        let leg = physics.colliders().iter().find(|c| c.bone == 1).unwrap();
        match leg.shape {
            ColliderShape::Capsule { offset, tail, radius } => {
                assert_eq!(offset, Vec3::ZERO);
                assert!(tail.abs_diff_eq(Vec3::new(0.0, -5.0, 0.0), 1e-5));
                assert!((radius - 0.6).abs() < 1e-5);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_authored_bodies_become_colliders() {
        let mut set = model();
        let bodies = [
            RigidBodyParam { name: "leg".into(), bone_index: 1, shape_type: 2, size: [0.8, 10.0, 0.0], position: [-1.0, 7.5, 0.0], ..Default::default() },
            RigidBodyParam { name: "box".into(), bone_index: 1, shape_type: 1, size: [0.5, 1.0, 0.9], ..Default::default() },
            RigidBodyParam { name: "bad".into(), bone_index: 1, shape_type: 9, ..Default::default() },
        ];
        let physics = SpringBonePhysics::with_config(&mut set, &bodies, still_config(), BoneNamePatterns::default());
        let leg: Vec<_> = physics.colliders().iter().filter(|c| c.bone == 1).collect();
        assert_eq!(leg.len(), 2);
        match leg[0].shape {
            ColliderShape::Capsule { offset, tail, radius } => {
                assert!(offset.abs_diff_eq(Vec3::new(0.0, -2.5, 0.0), 1e-5));
                // 胶囊长度不超过骨长
                assert!(tail.abs_diff_eq(Vec3::new(0.0, -5.0, 0.0), 1e-5));
                assert!((radius - 0.88).abs() < 1e-5);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!((leg[1].shape.radius() - 0.99).abs() < 1e-5);
    }

    #[test]
    fn test_hair_chain_at_rest_stays_still() {
        let mut set = BoneSet::new();
        let root = set.add_bone(BoneLink::new("髪1").with_position(Vec3::new(0.0, 10.0, 0.0)));
        set.add_bone(BoneLink::new("髪2").with_parent(root).with_position(Vec3::new(0.0, 9.0, 0.5)));
        set.build_hierarchy();
        let rest = set.get_bone(1).unwrap().position;
        let rest_world = set.world_position(1);

        let mut physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        assert_eq!(physics.joints().len(), 1);
        for _ in 0..120 {
            physics.update(&mut set, 1.0 / 60.0);
        }

        assert!(set.get_bone(1).unwrap().position.abs_diff_eq(rest, 1e-4));
        assert!(set.world_position(1).abs_diff_eq(rest_world, 1e-3));
        assert!(set.get_bone(0).unwrap().rotation.abs_diff_eq(Quat::IDENTITY, 1e-4));
    }

    #[test]
    fn test_no_matching_bones_yields_nothing() {
        let mut set = BoneSet::new();
        set.add_bone(BoneLink::new("root"));
        set.add_bone(BoneLink::new("arm").with_parent(0).with_position(Vec3::X));
        set.build_hierarchy();

        let mut physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        assert!(physics.joints().is_empty());
        assert!(physics.colliders().is_empty());
        physics.update(&mut set, 1.0 / 60.0);
        assert!(physics.create_helpers(&set).is_empty());
    }

    #[test]
    fn test_rescale_is_idempotent_and_order_independent() {
        let mut set = model();
        let mut a = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        a.rescale(&mut set, 2.0);
        a.rescale(&mut set, 2.0);

        let mut set_b = model();
        let mut b = SpringBonePhysics::with_config(&mut set_b, &[], still_config(), BoneNamePatterns::default());
        b.rescale(&mut set_b, 3.0);
        b.rescale(&mut set_b, 2.0);

        let radii = |p: &SpringBonePhysics| -> Vec<f32> { p.colliders().iter().map(|c| c.shape.radius()).collect() };
        let hits = |p: &SpringBonePhysics| -> Vec<f32> { p.joints().iter().map(|j| j.settings.hit_radius).collect() };
        assert_eq!(radii(&a), radii(&b));
        assert_eq!(hits(&a), hits(&b));

        let base: Vec<f32> = a.colliders().iter().map(|c| c.base_shape().radius() * 2.0).collect();
        assert_eq!(radii(&a), base);
        let skirt = a.joints().iter().find(|j| j.bone == 5).unwrap();
        assert_eq!(skirt.settings.gravity_power, Some(2.0));
        let hair = a.joints().iter().find(|j| j.bone == 3).unwrap();
        assert_eq!(hair.settings.gravity_power, None);
    }

    #[test]
    fn test_helpers_one_shape_per_collider_one_line_per_joint() {
        let mut set = model();
        let physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        let helpers = physics.create_helpers(&set);
        assert_eq!(helpers.shapes.len(), physics.colliders().len());
        assert_eq!(helpers.lines.len(), physics.joints().len());
    }

    #[test]
    fn test_dispose_clears_flags() {
        let mut set = model();
        let physics = SpringBonePhysics::with_config(&mut set, &[], still_config(), BoneNamePatterns::default());
        physics.dispose(&mut set);
        assert!(set.bones().iter().all(|b| !b.is_physics_driven()));
    }
}
