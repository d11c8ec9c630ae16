//! 弹簧关节管理器
//!
//! 关节按骨骼深度排序，父骨骼的关节先更新；
//! 每个关节更新后刷新其骨骼子树的世界矩阵，子关节读到的是新姿态。

use crate::skeleton::BoneSet;

use super::collider::SpringCollider;
use super::joint::SpringJoint;

#[derive(Debug, Clone, Default)]
pub struct SpringBoneManager {
    joints: Vec<SpringJoint>,
    colliders: Vec<SpringCollider>,
    /// 更新顺序（按骨骼深度）
    order: Vec<usize>,
}

impl SpringBoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加碰撞体，返回索引
    pub fn add_collider(&mut self, collider: SpringCollider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    pub fn add_joint(&mut self, joint: SpringJoint) {
        self.joints.push(joint);
        self.order.clear();
    }

    pub fn joints(&self) -> &[SpringJoint] {
        &self.joints
    }

    pub fn colliders(&self) -> &[SpringCollider] {
        &self.colliders
    }

    pub fn joints_mut(&mut self) -> &mut [SpringJoint] {
        &mut self.joints
    }

    pub fn colliders_mut(&mut self) -> &mut [SpringCollider] {
        &mut self.colliders
    }

    fn sort_joints(&mut self, skeleton: &BoneSet) {
        let mut order: Vec<usize> = (0..self.joints.len()).collect();
        order.sort_by_key(|&i| skeleton.depth(self.joints[i].bone));
        self.order = order;
    }

    /// 以骨骼当前姿态为所有关节的静止状态
    pub fn set_init_state(&mut self, skeleton: &BoneSet) {
        self.sort_joints(skeleton);
        for &i in &self.order {
            self.joints[i].set_init_state(skeleton);
        }
    }

    pub fn update(&mut self, skeleton: &mut BoneSet, delta: f32) {
        if self.order.len() != self.joints.len() {
            self.sort_joints(skeleton);
        }
        for &i in &self.order {
            let joint = &mut self.joints[i];
            skeleton.update_bone_world(joint.bone);
            joint.update(skeleton, &self.colliders, delta);
            skeleton.update_subtree(joint.bone);
        }
    }
}
