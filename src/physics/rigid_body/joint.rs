//! MMD 关节（6DOF 弹簧约束）
//!
//! Bullet3 使用 btGeneric6DofSpringConstraint，
//! 这里用 rapier 的 GenericJoint 配合 limits 和 motors 实现：
//! - 上下限相同且无弹簧 → 锁定该轴
//! - lower <= upper → 设置限制
//! - lower > upper → 该轴自由
//! - 弹簧刚度非零 → 该轴加位置电机（目标 0）

use glam::{Mat4, Vec3};
use rapier3d::prelude::*;

use crate::physics::config::PhysicsConfig;
use crate::physics::params::JointParam;

use super::body::mat4_to_isometry;

const EPSILON: f32 = 1e-4;

/// 单根轴的约束方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisLimit {
    Locked,
    Limited(f32, f32),
    Free,
}

impl AxisLimit {
    fn classify(lower: f32, upper: f32, spring: f32) -> Self {
        if (upper - lower).abs() < EPSILON && spring == 0.0 {
            Self::Locked
        } else if lower <= upper {
            Self::Limited(lower, upper)
        } else {
            Self::Free
        }
    }
}

/// 两个刚体之间的 6DOF 弹簧约束
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub body_a: usize,
    pub body_b: usize,
    /// 锚点在刚体 A 局部空间的变换
    pub frame_a: Mat4,
    /// 锚点在刚体 B 局部空间的变换
    pub frame_b: Mat4,
    pub linear_lower: Vec3,
    pub linear_upper: Vec3,
    pub angular_lower: Vec3,
    pub angular_upper: Vec3,
    pub linear_spring: Vec3,
    pub angular_spring: Vec3,
    pub(crate) handle: Option<ImpulseJointHandle>,
}

impl Constraint {
    /// 由两个刚体当前的世界变换和锚点计算局部坐标系
    pub fn new(param: &JointParam, body_a: usize, body_b: usize, world_a: Mat4, world_b: Mat4) -> Self {
        let anchor = Mat4::from_rotation_translation(param.anchor_rotation(), param.anchor_position());
        Self {
            name: param.name.clone(),
            body_a,
            body_b,
            frame_a: world_a.inverse() * anchor,
            frame_b: world_b.inverse() * anchor,
            linear_lower: Vec3::from_array(param.position_min),
            linear_upper: Vec3::from_array(param.position_max),
            angular_lower: Vec3::from_array(param.rotation_min),
            angular_upper: Vec3::from_array(param.rotation_max),
            linear_spring: Vec3::from_array(param.position_spring),
            angular_spring: Vec3::from_array(param.rotation_spring),
            handle: None,
        }
    }

    /// 六根轴各自的约束方式（LinX, LinY, LinZ, AngX, AngY, AngZ）
    pub fn axis_limits(&self) -> [(JointAxis, AxisLimit, f32); 6] {
        let lin = |i: usize, axis: JointAxis| {
            let spring = self.linear_spring[i];
            (axis, AxisLimit::classify(self.linear_lower[i], self.linear_upper[i], spring), spring)
        };
        let ang = |i: usize, axis: JointAxis| {
            let spring = self.angular_spring[i];
            (axis, AxisLimit::classify(self.angular_lower[i], self.angular_upper[i], spring), spring)
        };
        [
            lin(0, JointAxis::LinX),
            lin(1, JointAxis::LinY),
            lin(2, JointAxis::LinZ),
            ang(0, JointAxis::AngX),
            ang(1, JointAxis::AngY),
            ang(2, JointAxis::AngZ),
        ]
    }

    /// 创建 rapier GenericJoint
    pub fn build_joint(&self, config: &PhysicsConfig) -> GenericJoint {
        let axes = self.axis_limits();

        let mut locked = JointAxesMask::empty();
        for (axis, limit, _) in &axes {
            if *limit == AxisLimit::Locked {
                locked |= JointAxesMask::from(*axis);
            }
        }

        let mut joint = GenericJointBuilder::new(locked)
            .local_frame1(mat4_to_isometry(self.frame_a))
            .local_frame2(mat4_to_isometry(self.frame_b))
            .build();

        // 关节连接的两个刚体之间不碰撞
        joint.contacts_enabled = false;

        for (axis, limit, spring) in axes {
            if let AxisLimit::Limited(lower, upper) = limit {
                joint.set_limits(axis, [lower, upper]);
            }
            if spring != 0.0 && limit != AxisLimit::Locked {
                let stiffness = spring * config.spring_stiffness_scale;
                let damping = (stiffness.abs() * config.spring_damping_factor).sqrt();
                joint.set_motor_position(axis, 0.0, stiffness, damping);
            }
        }

        joint
    }

    /// 有弹簧的轴数
    pub fn spring_axis_count(&self) -> usize {
        self.axis_limits().iter().filter(|(_, _, spring)| *spring != 0.0).count()
    }
}
