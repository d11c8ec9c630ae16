//! 按骨骼名称分类
//!
//! 头发/裙子按子串匹配，碰撞体骨骼按全名匹配。
//! 默认规则只覆盖常见的日文/英文 MMD 命名，匹配不到时不生成任何关节或碰撞体。

use crate::skeleton::BoneSet;

/// 骨骼名称匹配规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneNamePatterns {
    /// 头发/双马尾（子串）
    pub hair: Vec<String>,
    /// 裙子（子串）
    pub skirt: Vec<String>,
    /// 腿/躯干碰撞体骨骼（全名）
    pub collider_bones: Vec<String>,
}

impl Default for BoneNamePatterns {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            hair: owned(&["髪", "Hair", "Twin"]),
            skirt: owned(&["裙", "スカート", "Skirt"]),
            collider_bones: owned(&[
                "センター", "上半身", "右ひざ", "右足", "右足D", "左ひざ", "左足", "左足D",
            ]),
        }
    }
}

impl BoneNamePatterns {
    /// 不匹配任何骨骼的规则
    pub fn empty() -> Self {
        Self { hair: Vec::new(), skirt: Vec::new(), collider_bones: Vec::new() }
    }

    pub fn is_hair(&self, name: &str) -> bool {
        self.hair.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn is_skirt(&self, name: &str) -> bool {
        self.skirt.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn is_collider_bone(&self, name: &str) -> bool {
        self.collider_bones.iter().any(|p| p == name)
    }

    pub fn hair_bones(&self, skeleton: &BoneSet) -> Vec<usize> {
        filter_bones(skeleton, |name| self.is_hair(name))
    }

    pub fn skirt_bones(&self, skeleton: &BoneSet) -> Vec<usize> {
        filter_bones(skeleton, |name| self.is_skirt(name))
    }

    pub fn collider_bones(&self, skeleton: &BoneSet) -> Vec<usize> {
        filter_bones(skeleton, |name| self.is_collider_bone(name))
    }
}

fn filter_bones(skeleton: &BoneSet, pred: impl Fn(&str) -> bool) -> Vec<usize> {
    skeleton
        .bones()
        .iter()
        .enumerate()
        .filter(|(_, bone)| pred(&bone.name))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneLink;

    #[test]
    fn test_default_patterns() {
        let p = BoneNamePatterns::default();
        assert!(p.is_hair("前髪1"));
        assert!(p.is_hair("TwinTail_L"));
        assert!(p.is_skirt("スカート前1"));
        assert!(p.is_collider_bone("右足"));
        // 碰撞体骨骼按全名匹配
        assert!(!p.is_collider_bone("右足首"));
    }

    #[test]
    fn test_no_match_yields_nothing() {
        let mut set = BoneSet::new();
        set.add_bone(BoneLink::new("root"));
        set.add_bone(BoneLink::new("arm").with_parent(0));
        set.build_hierarchy();

        let p = BoneNamePatterns::default();
        assert!(p.hair_bones(&set).is_empty());
        assert!(p.skirt_bones(&set).is_empty());
        assert!(BoneNamePatterns::empty().collider_bones(&set).is_empty());
    }
}
