//! Rapier 物理世界
//!
//! | Bullet3 | Rapier |
//! |---------|--------|
//! | btDiscreteDynamicsWorld | PhysicsPipeline + RigidBodySet + ColliderSet + ImpulseJointSet |
//! | btDbvtBroadphase | DefaultBroadPhase |
//! | btSequentialImpulseConstraintSolver | 内置于 PhysicsPipeline |
//! | stepSimulation(dt, maxSubSteps, fixedStep) | `step_simulation` + `SubstepPolicy` |

use std::num::NonZeroUsize;

use glam::Vec3;
use rapier3d::prelude::*;

use crate::physics::config::PhysicsConfig;

/// 有界子步策略
///
/// 子步数 = floor(delta / unit_step) + 1，钳制到 max_step_num；
/// delta 小于一个子步时只走一步，步长仍为 unit_step。
/// 每步时长固定，牺牲时间精度换取每帧开销有上限。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstepPolicy {
    pub unit_step: f32,
    pub max_step_num: usize,
}

impl Default for SubstepPolicy {
    fn default() -> Self {
        Self { unit_step: 1.0 / 65.0, max_step_num: 3 }
    }
}

impl SubstepPolicy {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            unit_step: config.unit_step,
            max_step_num: config.max_step_num.max(1),
        }
    }

    /// 本帧应执行的子步数
    pub fn substeps(&self, delta: f32) -> usize {
        if !(delta >= self.unit_step) {
            return 1;
        }
        let steps = (delta / self.unit_step) as usize + 1;
        steps.clamp(1, self.max_step_num.max(1))
    }
}

/// Rapier 世界及其全部集合
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<Real>,
    policy: SubstepPolicy,
    /// 上一次 `step_simulation` 执行的子步数
    last_substeps: usize,
    /// 累计子步数
    total_substeps: u64,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let policy = SubstepPolicy::from_config(config);

        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = policy.unit_step;
        if let Some(iterations) = NonZeroUsize::new(config.solver_iterations) {
            integration_parameters.num_solver_iterations = iterations;
        }

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![0.0, config.gravity_y, 0.0],
            policy,
            last_substeps: 0,
            total_substeps: 0,
        }
    }

    pub fn policy(&self) -> SubstepPolicy {
        self.policy
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = vector![gravity.x, gravity.y, gravity.z];
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    pub fn last_substeps(&self) -> usize {
        self.last_substeps
    }

    pub fn total_substeps(&self) -> u64 {
        self.total_substeps
    }

    /// 按子步策略推进模拟，返回执行的子步数
    pub fn step_simulation(&mut self, delta: f32) -> usize {
        let steps = self.policy.substeps(delta);
        self.integration_parameters.dt = self.policy.unit_step;
        for _ in 0..steps {
            self.step_once();
        }
        self.last_substeps = steps;
        self.total_substeps += steps as u64;
        steps
    }

    fn step_once(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// 插入刚体及其碰撞体
    pub fn insert_body(&mut self, body: RigidBody, collider: Collider) -> (RigidBodyHandle, ColliderHandle) {
        let handle = self.bodies.insert(body);
        let collider_handle = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        (handle, collider_handle)
    }

    pub fn insert_joint(
        &mut self,
        body_a: RigidBodyHandle,
        body_b: RigidBodyHandle,
        joint: GenericJoint,
    ) -> ImpulseJointHandle {
        self.impulse_joints.insert(body_a, body_b, joint, true)
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joints.remove(handle, true);
    }

    /// 移除刚体（连同其碰撞体和关节）
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substeps_below_unit_step() {
        let policy = SubstepPolicy::default();
        assert_eq!(policy.substeps(0.5 * policy.unit_step), 1);
        assert_eq!(policy.substeps(0.0), 1);
        assert_eq!(policy.substeps(-1.0), 1);
    }

    #[test]
    fn test_substeps_clamped() {
        let policy = SubstepPolicy::default();
        assert_eq!(policy.substeps(10.0 * policy.unit_step), 3);
        assert_eq!(policy.substeps(1000.0), 3);
    }

    #[test]
    fn test_substeps_floor_plus_one() {
        let policy = SubstepPolicy { unit_step: 0.1, max_step_num: 10 };
        assert_eq!(policy.substeps(0.15), 2);
        assert_eq!(policy.substeps(0.25), 3);
    }

    #[test]
    fn test_step_simulation_counts() {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::new(&config);
        let unit = world.policy().unit_step;

        assert_eq!(world.step_simulation(0.5 * unit), 1);
        assert_eq!(world.last_substeps(), 1);
        assert_eq!(world.step_simulation(10.0 * unit), 3);
        assert_eq!(world.total_substeps(), 4);
    }

    #[test]
    fn test_sub_unit_delta_advances_full_unit_step() {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::new(&config);
        let unit = world.policy().unit_step;

        let body = RigidBodyBuilder::dynamic().can_sleep(false).build();
        let collider = ColliderBuilder::ball(0.5).mass(1.0).build();
        let (handle, _) = world.insert_body(body, collider);

        world.step_simulation(0.5 * unit);
        // 一个完整子步后速度 = g * unit_step，而不是 g * delta
        let vy = world.bodies[handle].linvel().y;
        assert!((vy - config.gravity_y * unit).abs() < 1e-3, "vy = {vy}");
    }
}
