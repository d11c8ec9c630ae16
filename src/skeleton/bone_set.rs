//! 骨骼集合
//!
//! 管理骨骼层次：父子关系、按层级排序的刷新顺序、世界矩阵计算。

use std::collections::HashMap;

use glam::{Mat4, Vec3};

use super::{BoneLink, ModelTransform};

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    bones: Vec<BoneLink>,
    name_to_index: HashMap<String, usize>,
    /// 父骨骼先于子骨骼的刷新顺序
    sorted_indices: Vec<usize>,
    /// 每根骨骼的深度（根骨骼为 0）
    depths: Vec<usize>,
    /// `update_subtree` 复用的遍历栈
    subtree_stack: Vec<usize>,
    /// 模型根变换
    pub root: ModelTransform,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回索引
    pub fn add_bone(&mut self, mut bone: BoneLink) -> usize {
        let index = self.bones.len();
        bone.internal_id = index;
        self.name_to_index.entry(bone.name.clone()).or_insert(index);
        self.bones.push(bone);
        index
    }

    /// 构建骨骼层级
    ///
    /// 计算子骨骼列表、静止偏移、刷新顺序，并恢复到静止姿态。
    /// 父索引越界的骨骼按根骨骼处理。
    pub fn build_hierarchy(&mut self) {
        let count = self.bones.len();

        for bone in &mut self.bones {
            if bone.parent_index >= count as i32 || bone.parent_index == bone.internal_id as i32 {
                log::warn!("[骨骼] '{}' 父索引 {} 无效，按根骨骼处理", bone.name, bone.parent_index);
                bone.parent_index = -1;
            }
        }

        self.link_children();
        self.sort_by_depth();

        // 父链成环的骨骼从根出发访问不到，断开它们的父关系后重新排序
        if self.sorted_indices.len() < count {
            let mut reached = vec![false; count];
            for &idx in &self.sorted_indices {
                reached[idx] = true;
            }
            for (bone, _) in self.bones.iter_mut().zip(reached).filter(|(_, r)| !r) {
                log::warn!("[骨骼] '{}' 无法从根骨骼到达（父子成环），按根骨骼处理", bone.name);
                bone.parent_index = -1;
            }
            self.link_children();
            self.sort_by_depth();
        }

        for i in 0..count {
            let offset = match self.bones[i].parent_id() {
                Some(parent) => self.bones[i].initial_position - self.bones[parent].initial_position,
                None => self.bones[i].initial_position,
            };
            self.bones[i].body_shift = offset;
        }

        self.pose();
    }

    fn link_children(&mut self) {
        for bone in &mut self.bones {
            bone.children.clear();
        }
        for i in 0..self.bones.len() {
            if let Some(parent) = self.bones[i].parent_id() {
                self.bones[parent].children.push(i);
            }
        }
    }

    /// 从根骨骼广度优先，保证父骨骼先刷新
    fn sort_by_depth(&mut self) {
        let count = self.bones.len();
        self.sorted_indices.clear();
        self.depths = vec![0; count];
        let mut head = 0;
        self.sorted_indices.extend((0..count).filter(|&i| self.bones[i].is_root()));
        while head < self.sorted_indices.len() {
            let idx = self.sorted_indices[head];
            head += 1;
            for &child in &self.bones[idx].children {
                self.depths[child] = self.depths[idx] + 1;
                self.sorted_indices.push(child);
            }
        }
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// 获取骨骼
    pub fn get_bone(&self, index: usize) -> Option<&BoneLink> {
        self.bones.get(index)
    }

    /// 获取可变骨骼引用
    pub fn get_bone_mut(&mut self, index: usize) -> Option<&mut BoneLink> {
        self.bones.get_mut(index)
    }

    pub fn bones(&self) -> &[BoneLink] {
        &self.bones
    }

    /// 骨骼深度（根骨骼为 0）
    pub fn depth(&self, index: usize) -> usize {
        self.depths.get(index).copied().unwrap_or(0)
    }

    /// 恢复所有骨骼到静止姿态并刷新世界矩阵
    pub fn pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_pose();
        }
        self.update_world_matrices();
    }

    /// 模型根世界矩阵
    #[inline]
    pub fn model_world_matrix(&self) -> Mat4 {
        self.root.world_matrix()
    }

    /// 父骨骼世界矩阵（根骨骼返回模型根世界矩阵）
    pub fn parent_world_matrix(&self, index: usize) -> Mat4 {
        match self.bones.get(index).and_then(|b| b.parent_id()) {
            Some(parent) => self.bones[parent].local_to_world,
            None => self.model_world_matrix(),
        }
    }

    /// 骨骼世界矩阵
    #[inline]
    pub fn world_matrix(&self, index: usize) -> Mat4 {
        self.bones.get(index).map_or(Mat4::IDENTITY, |b| b.local_to_world)
    }

    /// 骨骼世界位置
    #[inline]
    pub fn world_position(&self, index: usize) -> Vec3 {
        self.world_matrix(index).w_axis.truncate()
    }

    /// 世界坐标 → 骨骼本地坐标
    pub fn world_to_local(&self, index: usize, point: Vec3) -> Vec3 {
        self.world_matrix(index).inverse().transform_point3(point)
    }

    /// 刷新全部骨骼的世界矩阵
    pub fn update_world_matrices(&mut self) {
        let model = self.model_world_matrix();
        for i in 0..self.sorted_indices.len() {
            let idx = self.sorted_indices[i];
            let parent_world = match self.bones[idx].parent_id() {
                Some(parent) => self.bones[parent].local_to_world,
                None => model,
            };
            let local = self.bones[idx].local_transform();
            self.bones[idx].local_to_world = parent_world * local;
        }
    }

    /// 刷新单根骨骼及其所有子孙的世界矩阵
    pub fn update_subtree(&mut self, index: usize) {
        if index >= self.bones.len() {
            return;
        }
        let mut stack = std::mem::take(&mut self.subtree_stack);
        stack.clear();
        stack.push(index);
        while let Some(idx) = stack.pop() {
            let parent_world = self.parent_world_matrix(idx);
            let local = self.bones[idx].local_transform();
            self.bones[idx].local_to_world = parent_world * local;
            stack.extend(self.bones[idx].children.iter().copied());
        }
        self.subtree_stack = stack;
    }

    /// 仅刷新单根骨骼自身的世界矩阵
    pub fn update_bone_world(&mut self, index: usize) {
        if index >= self.bones.len() {
            return;
        }
        let parent_world = self.parent_world_matrix(index);
        let local = self.bones[index].local_transform();
        self.bones[index].local_to_world = parent_world * local;
    }

    /// 临时替换模型根变换执行 `f`，结束后恢复原变换并刷新世界矩阵
    pub fn with_model_transform<R>(
        &mut self,
        transform: ModelTransform,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let saved = std::mem::replace(&mut self.root, transform);
        self.update_world_matrices();
        let result = f(self);
        self.root = saved;
        self.update_world_matrices();
        result
    }

    /// 清除所有骨骼的物理接管标志
    pub fn clear_physics_flags(&mut self) {
        for bone in &mut self.bones {
            bone.set_physics_driven(false);
        }
    }
}
