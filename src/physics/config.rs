//! MMD 物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    // ========== 重力 ==========
    /// 重力 Y 分量（负数向下），默认 -98.0（MMD 标准）
    pub gravity_y: f32,

    // ========== 步进 ==========
    /// 固定子步长（秒），默认 1/65
    pub unit_step: f32,
    /// 每帧最大子步数，默认 3
    pub max_step_num: usize,
    /// 求解器迭代次数，默认 8
    pub solver_iterations: usize,

    // ========== 刚体 ==========
    /// 线性阻尼缩放（乘以 PMX 原值），默认 1.0
    pub linear_damping_scale: f32,
    /// 角速度阻尼缩放（乘以 PMX 原值），默认 1.0
    pub angular_damping_scale: f32,
    /// 质量缩放（乘以 PMX 原值），默认 1.0
    pub mass_scale: f32,

    // ========== 6DOF 弹簧 ==========
    /// 弹簧刚度缩放因子，默认 1.0
    pub spring_stiffness_scale: f32,
    /// 弹簧阻尼系数，damping = sqrt(stiffness * factor)
    pub spring_damping_factor: f32,

    // ========== 弹簧骨：头发 ==========
    pub hair_stiffness: f32,
    pub hair_drag_force: f32,
    /// None 表示未配置（缩放时不参与）
    pub hair_gravity_power: Option<f32>,
    pub hair_hit_radius: f32,

    // ========== 弹簧骨：裙子 ==========
    pub skirt_stiffness: f32,
    pub skirt_drag_force: f32,
    pub skirt_gravity_power: Option<f32>,
    pub skirt_hit_radius: f32,

    // ========== 弹簧骨：碰撞体 ==========
    /// PMX 刚体尺寸 → 碰撞体半径的放大系数，默认 1.1
    pub collider_radius_scale: f32,
    /// 无刚体时默认胶囊半径 = 骨长 * ratio，默认 0.12
    pub default_collider_radius_ratio: f32,
    /// 默认胶囊半径上限 = 骨长 * ratio，默认 0.5
    pub default_collider_max_ratio: f32,

    // ========== 调试 ==========
    /// 是否启用关节，默认 true
    pub joints_enabled: bool,
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            // MMD 标准重力，PMX 模型的弹簧/质量/阻尼参数都是为此重力设计的
            gravity_y: -98.0,

            // 1/60 容易让模型炸开，经验值 1/65
            unit_step: 1.0 / 65.0,
            max_step_num: 3,
            solver_iterations: 8,

            linear_damping_scale: 1.0,
            angular_damping_scale: 1.0,
            mass_scale: 1.0,

            spring_stiffness_scale: 1.0,
            spring_damping_factor: 0.05,

            hair_stiffness: 0.75,
            hair_drag_force: 0.4,
            hair_gravity_power: None,
            hair_hit_radius: 0.05,

            skirt_stiffness: 5.0,
            skirt_drag_force: 0.1,
            skirt_gravity_power: Some(1.0),
            skirt_hit_radius: 0.15,

            collider_radius_scale: 1.1,
            default_collider_radius_ratio: 0.1 * 1.2,
            default_collider_max_ratio: 0.5,

            joints_enabled: true,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static PHYSICS_CONFIG: Lazy<RwLock<PhysicsConfig>> = Lazy::new(|| {
    RwLock::new(PhysicsConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> PhysicsConfig {
    PHYSICS_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: PhysicsConfig) {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = PhysicsConfig::default();
}
