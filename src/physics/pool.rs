//! 临时数学对象池
//!
//! 每帧同步刚体时需要大量临时向量/四元数/矩阵。这里按类型维护空闲列表，
//! `alloc` 取出（耗尽时增长），守卫 `Pooled` 在 drop 时自动归还，
//! 所以提前 return、`?` 和 panic 展开路径都不会泄漏池容量。
//!
//! 池不是线程安全的，只在单个更新线程内使用。

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

use glam::{Mat4, Quat, Vec3};

/// 单一类型的空闲列表
#[doc(hidden)]
#[derive(Debug)]
pub struct FreeList<T> {
    free: Vec<T>,
    /// 已借出未归还的数量
    outstanding: usize,
    /// 累计新建的数量（池增长次数）
    created: usize,
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self { free: Vec::new(), outstanding: 0, created: 0 }
    }
}

/// 可池化的类型
pub trait Poolable: Copy + Default + Sized {
    #[doc(hidden)]
    fn list(pool: &ResourcePool) -> &RefCell<FreeList<Self>>;

    /// 复用前清理上次借出时写入的值
    #[inline]
    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Poolable for Vec3 {
    fn list(pool: &ResourcePool) -> &RefCell<FreeList<Self>> {
        &pool.vectors
    }
}

impl Poolable for Quat {
    fn list(pool: &ResourcePool) -> &RefCell<FreeList<Self>> {
        &pool.quaternions
    }
}

impl Poolable for Mat4 {
    fn list(pool: &ResourcePool) -> &RefCell<FreeList<Self>> {
        &pool.transforms
    }
}

/// 资源池
#[derive(Debug, Default)]
pub struct ResourcePool {
    vectors: RefCell<FreeList<Vec3>>,
    quaternions: RefCell<FreeList<Quat>>,
    transforms: RefCell<FreeList<Mat4>>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预先为每种类型准备 `count` 个对象
    pub fn with_capacity(count: usize) -> Self {
        let pool = Self::default();
        pool.reserve::<Vec3>(count);
        pool.reserve::<Quat>(count);
        pool.reserve::<Mat4>(count);
        pool
    }

    fn reserve<T: Poolable>(&self, count: usize) {
        let mut list = T::list(self).borrow_mut();
        list.free.reserve(count);
        for _ in 0..count {
            list.free.push(T::default());
        }
        list.created += count;
    }

    /// 从空闲列表取出一个对象并重置为默认值，池空时新建
    pub fn alloc<T: Poolable>(&self) -> Pooled<'_, T> {
        let mut list = T::list(self).borrow_mut();
        let value = match list.free.pop() {
            Some(mut value) => {
                value.reset();
                value
            }
            None => {
                list.created += 1;
                T::default()
            }
        };
        list.outstanding += 1;
        Pooled { value, pool: self }
    }

    /// 取出一个对象并写入初值
    pub fn alloc_with<T: Poolable>(&self, value: T) -> Pooled<'_, T> {
        let mut pooled = self.alloc::<T>();
        *pooled = value;
        pooled
    }

    /// 显式归还（等价于 drop）
    pub fn free<T: Poolable>(&self, pooled: Pooled<'_, T>) {
        drop(pooled);
    }

    fn release<T: Poolable>(&self, value: T) {
        let mut list = T::list(self).borrow_mut();
        list.outstanding = list.outstanding.saturating_sub(1);
        list.free.push(value);
    }

    /// 借出未归还的数量
    pub fn outstanding<T: Poolable>(&self) -> usize {
        T::list(self).borrow().outstanding
    }

    /// 所有类型借出未归还的总数
    pub fn total_outstanding(&self) -> usize {
        self.outstanding::<Vec3>() + self.outstanding::<Quat>() + self.outstanding::<Mat4>()
    }

    /// 空闲可复用的数量
    pub fn available<T: Poolable>(&self) -> usize {
        T::list(self).borrow().free.len()
    }

    /// 累计新建的数量
    pub fn created<T: Poolable>(&self) -> usize {
        T::list(self).borrow().created
    }
}

/// 借出的池对象，drop 时归还
pub struct Pooled<'a, T: Poolable> {
    value: T,
    pool: &'a ResourcePool,
}

impl<T: Poolable> Pooled<'_, T> {
    /// 拷贝出当前值
    #[inline]
    pub fn get(&self) -> T {
        self.value
    }
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_alloc_free_returns_to_baseline() {
        let pool = ResourcePool::new();
        let before = pool.total_outstanding();
        {
            let mut a = pool.alloc::<Vec3>();
            let b = pool.alloc::<Quat>();
            let c = pool.alloc_with(Mat4::from_translation(Vec3::X));
            *a = Vec3::ONE;
            assert_eq!(pool.total_outstanding(), before + 3);
            assert_eq!(c.get().w_axis.x, 1.0);
            pool.free(b);
            assert_eq!(pool.outstanding::<Quat>(), 0);
        }
        assert_eq!(pool.total_outstanding(), before);
    }

    #[test]
    fn test_reuse_does_not_grow() {
        let pool = ResourcePool::new();
        for _ in 0..10 {
            let _a = pool.alloc::<Mat4>();
            let _b = pool.alloc::<Mat4>();
        }
        // 只有第一轮需要新建
        assert_eq!(pool.created::<Mat4>(), 2);
        assert_eq!(pool.available::<Mat4>(), 2);
    }

    #[test]
    fn test_grows_on_exhaustion() {
        let pool = ResourcePool::with_capacity(1);
        let _a = pool.alloc::<Vec3>();
        let _b = pool.alloc::<Vec3>();
        assert_eq!(pool.created::<Vec3>(), 2);
        assert_eq!(pool.outstanding::<Vec3>(), 2);
    }

    #[test]
    fn test_early_return_releases() {
        fn compute(pool: &ResourcePool, fail: bool) -> Result<f32, ()> {
            let v = pool.alloc_with(Vec3::new(1.0, 2.0, 3.0));
            let _q = pool.alloc::<Quat>();
            if fail {
                return Err(());
            }
            Ok(v.length())
        }

        let pool = ResourcePool::new();
        assert!(compute(&pool, true).is_err());
        assert!(compute(&pool, false).is_ok());
        assert_eq!(pool.total_outstanding(), 0);
    }

    #[test]
    fn test_alloc_yields_default_value() {
        let pool = ResourcePool::new();
        {
            let mut m = pool.alloc::<Mat4>();
            *m = Mat4::from_scale(Vec3::splat(3.0));
        }
        assert_eq!(pool.available::<Mat4>(), 1);
        let reused = pool.alloc::<Mat4>();
        // 取走空闲列表里的那一个，且不携带上次的值
        assert_eq!(pool.available::<Mat4>(), 0);
        assert_eq!(pool.created::<Mat4>(), 1);
        assert_eq!(reused.get(), Mat4::IDENTITY);
    }
}
