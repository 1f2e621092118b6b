//! 列表 diff：由旧快照与新快照计算编辑脚本
//!
//! 脚本顺序：先按下标降序 `Remove`，再按最终位置升序 `Move`/`Insert`，
//! 最后在最终下标上 `Change`。保留相对顺序的存活项（最长递增子序列）
//! 不产生任何操作，其余存活项各移动一次。
//!
//! 下标换算用链表槽位加树状数组，整体 O(n log n)。

use crate::error::{DiffError, Side};
use crate::view::{self, ViewItem};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// 单个编辑操作，按顺序应用到旧列表上即可得到新列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<T> {
    Insert { index: usize, item: T },
    Remove { index: usize },
    /// 先移除 `from`，再插入到 `to`（`to` 以移除后的列表为准）
    Move { from: usize, to: usize },
    Change { index: usize, item: T },
}

/// 列表项 diff（身份键 + 内容相等）
pub fn diff(old: &[ViewItem], new: &[ViewItem]) -> Result<Vec<Edit<ViewItem>>, DiffError> {
    diff_by(old, new, ViewItem::identity_key, view::same_content)
}

/// 通用 diff：`key_of` 给出身份键，`same_content` 判断身份相同的两项是否需要 `Change`
pub fn diff_by<'a, T, K, F, C>(
    old: &'a [T],
    new: &'a [T],
    key_of: F,
    same_content: C,
) -> Result<Vec<Edit<T>>, DiffError>
where
    T: Clone,
    K: Eq + Hash + Debug,
    F: Fn(&'a T) -> K,
    C: Fn(&T, &T) -> bool,
{
    let old_index = index_keys(old, Side::Old, &key_of)?;
    let new_index = index_keys(new, Side::New, &key_of)?;
    let mut script = Vec::new();

    // 删除：降序，保证前面的下标不受影响
    for i in (0..old.len()).rev() {
        if !new_index.contains_key(&key_of(&old[i])) {
            script.push(Edit::Remove { index: i });
        }
    }

    // 存活项按旧顺序排列，每项用它在新列表中的位置表示
    let survivors: Vec<usize> = old
        .iter()
        .filter_map(|item| new_index.get(&key_of(item)).copied())
        .collect();
    let stable = longest_increasing(&survivors, new.len());

    // 第一遍：在链表上逐项放置（紧跟新列表前一项），移动的项留下墓碑，
    // 得到所有槽位的全序
    let mut slots = Slots::with_capacity(survivors.len() + new.len());
    let mut slot_of: Vec<Option<usize>> = vec![None; new.len()];
    let mut tail = Slots::HEAD;
    for &j in &survivors {
        tail = slots.insert_after(tail);
        slot_of[j] = Some(tail);
    }
    let mut placements = Vec::new();
    for (j, item) in new.iter().enumerate() {
        let inserted = !old_index.contains_key(&key_of(item));
        if !inserted && stable[j] {
            continue;
        }
        let after = match j.checked_sub(1) {
            None => Slots::HEAD,
            Some(pred) => {
                let Some(slot) = slot_of[pred] else {
                    unreachable!("predecessor {pred} not placed before {j}");
                };
                slot
            }
        };
        let slot = slots.insert_after(after);
        let vacated = if inserted { None } else { slot_of[j] };
        slot_of[j] = Some(slot);
        placements.push((j, vacated, slot));
    }

    // 第二遍：按槽位全序统计存活项，换算成下标
    let rank = slots.ranks();
    let mut alive = Fenwick::new(rank.len());
    for slot in 1..=survivors.len() {
        alive.insert(rank[slot]);
    }
    for (j, vacated, slot) in placements {
        match vacated {
            None => {
                let index = alive.count_before(rank[slot]);
                alive.insert(rank[slot]);
                script.push(Edit::Insert {
                    index,
                    item: new[j].clone(),
                });
            }
            Some(old_slot) => {
                let from = alive.count_before(rank[old_slot]);
                alive.remove(rank[old_slot]);
                let to = alive.count_before(rank[slot]);
                alive.insert(rank[slot]);
                if from != to {
                    script.push(Edit::Move { from, to });
                }
            }
        }
    }

    // 内容变更：此时列表已与新列表同序
    for (j, item) in new.iter().enumerate() {
        if let Some(&i) = old_index.get(&key_of(item)) {
            if !same_content(&old[i], item) {
                script.push(Edit::Change {
                    index: j,
                    item: item.clone(),
                });
            }
        }
    }

    Ok(script)
}

/// 把脚本应用到列表上
pub fn apply<T: Clone>(list: &mut Vec<T>, script: &[Edit<T>]) -> Result<(), DiffError> {
    for edit in script {
        let len = list.len();
        match edit {
            Edit::Insert { index, item } => {
                if *index > len {
                    return Err(out_of_bounds("insert", *index, len));
                }
                list.insert(*index, item.clone());
            }
            Edit::Remove { index } => {
                if *index >= len {
                    return Err(out_of_bounds("remove", *index, len));
                }
                list.remove(*index);
            }
            Edit::Move { from, to } => {
                if *from >= len {
                    return Err(out_of_bounds("move", *from, len));
                }
                if *to >= len {
                    return Err(out_of_bounds("move", *to, len));
                }
                let item = list.remove(*from);
                list.insert(*to, item);
            }
            Edit::Change { index, item } => {
                if *index >= len {
                    return Err(out_of_bounds("change", *index, len));
                }
                list[*index] = item.clone();
            }
        }
    }
    Ok(())
}

fn out_of_bounds(op: &'static str, index: usize, len: usize) -> DiffError {
    DiffError::OutOfBounds { op, index, len }
}

fn index_keys<'a, T, K, F>(
    items: &'a [T],
    side: Side,
    key_of: &F,
) -> Result<HashMap<K, usize>, DiffError>
where
    K: Eq + Hash + Debug,
    F: Fn(&'a T) -> K,
{
    let mut index = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let key = key_of(item);
        if index.contains_key(&key) {
            return Err(DiffError::DuplicateKey {
                side,
                index: i,
                key: format!("{:?}", key),
            });
        }
        index.insert(key, i);
    }
    Ok(index)
}

/// 只增不删的单链表，槽位 0 为表头哨兵
struct Slots {
    next: Vec<Option<usize>>,
}

impl Slots {
    const HEAD: usize = 0;

    fn with_capacity(capacity: usize) -> Self {
        let mut next = Vec::with_capacity(capacity + 1);
        next.push(None);
        Self { next }
    }

    fn insert_after(&mut self, at: usize) -> usize {
        let slot = self.next.len();
        self.next.push(self.next[at]);
        self.next[at] = Some(slot);
        slot
    }

    /// 每个槽位在链表中的名次
    fn ranks(&self) -> Vec<usize> {
        let mut rank = vec![0; self.next.len()];
        let mut cursor = Some(Self::HEAD);
        let mut r = 0;
        while let Some(slot) = cursor {
            rank[slot] = r;
            r += 1;
            cursor = self.next[slot];
        }
        rank
    }
}

/// 树状数组：统计名次小于给定值的存活槽位数
struct Fenwick {
    tree: Vec<usize>,
}

impl Fenwick {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn insert(&mut self, rank: usize) {
        let mut i = rank + 1;
        while i < self.tree.len() {
            self.tree[i] += 1;
            i += i & i.wrapping_neg();
        }
    }

    /// 调用方保证 `rank` 当前存活
    fn remove(&mut self, rank: usize) {
        let mut i = rank + 1;
        while i < self.tree.len() {
            self.tree[i] -= 1;
            i += i & i.wrapping_neg();
        }
    }

    fn count_before(&self, rank: usize) -> usize {
        let mut i = rank;
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i &= i - 1;
        }
        sum
    }
}

/// 最长递增子序列，返回按值（新列表位置）标记的稳定项
fn longest_increasing(seq: &[usize], len: usize) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut stable = vec![false; len];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        stable[seq[i]] = true;
        cursor = prev[i];
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;

    type Row = (u32, u8);

    fn run(old: &[Row], new: &[Row]) -> Vec<Edit<Row>> {
        diff_by(old, new, |row: &Row| row.0, |a: &Row, b: &Row| a == b).unwrap()
    }

    fn replay(old: &[Row], script: &[Edit<Row>]) -> Vec<Row> {
        let mut list = old.to_vec();
        apply(&mut list, script).unwrap();
        list
    }

    fn rows(keys: &[u32]) -> Vec<Row> {
        keys.iter().map(|&k| (k, 0)).collect()
    }

    #[test]
    fn identical_lists_produce_empty_script() {
        let list = rows(&[1, 2, 3, 4]);
        assert!(run(&list, &list.clone()).is_empty());
        assert!(run(&[], &[]).is_empty());
    }

    #[test]
    fn inserts_and_removes() {
        let old = rows(&[1, 2, 3]);
        let new = rows(&[0, 1, 3, 4]);
        let script = run(&old, &new);
        assert_eq!(
            script,
            vec![
                Edit::Remove { index: 1 },
                Edit::Insert { index: 0, item: (0, 0) },
                Edit::Insert { index: 3, item: (4, 0) },
            ]
        );
        assert_eq!(replay(&old, &script), new);
    }

    #[test]
    fn moving_one_item_to_the_end_is_a_single_move() {
        let old = rows(&[1, 2, 3, 4, 5]);
        let new = rows(&[2, 3, 4, 5, 1]);
        let script = run(&old, &new);
        assert_eq!(script, vec![Edit::Move { from: 0, to: 4 }]);
        assert_eq!(replay(&old, &script), new);
    }

    #[test]
    fn permutation_yields_only_moves() {
        let old = rows(&[1, 2, 3, 4, 5, 6]);
        let new = rows(&[6, 4, 1, 5, 3, 2]);
        let script = run(&old, &new);
        assert!(script.iter().all(|e| matches!(e, Edit::Move { .. })));
        // 保持相对顺序的最多两项（如 1 与 3），其余 4 项各移动一次
        assert_eq!(script.len(), 4);
        assert_eq!(replay(&old, &script), new);
    }

    #[test]
    fn content_change_in_place() {
        let old = vec![(1, 0), (2, 0), (3, 0)];
        let new = vec![(1, 0), (2, 9), (3, 0)];
        let script = run(&old, &new);
        assert_eq!(script, vec![Edit::Change { index: 1, item: (2, 9) }]);
    }

    #[test]
    fn moved_and_changed_item_gets_move_then_change() {
        let old = vec![(1, 0), (2, 0), (3, 0)];
        let new = vec![(2, 0), (3, 0), (1, 5)];
        let script = run(&old, &new);
        assert_eq!(
            script,
            vec![
                Edit::Move { from: 0, to: 2 },
                Edit::Change { index: 2, item: (1, 5) },
            ]
        );
        assert_eq!(replay(&old, &script), new);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let old = rows(&[1, 2, 1]);
        let err = diff_by(&old, &rows(&[1]), |r: &Row| r.0, |a: &Row, b: &Row| a == b)
            .unwrap_err();
        assert!(matches!(
            err,
            DiffError::DuplicateKey {
                side: Side::Old,
                index: 2,
                ..
            }
        ));

        let new = rows(&[3, 3]);
        let err = diff_by(&rows(&[1]), &new, |r: &Row| r.0, |a: &Row, b: &Row| a == b)
            .unwrap_err();
        assert!(matches!(err, DiffError::DuplicateKey { side: Side::New, .. }));
    }

    #[test]
    fn apply_reports_out_of_bounds() {
        let mut list = rows(&[1]);
        let err = apply(&mut list, &[Edit::Remove { index: 3 }]).unwrap_err();
        assert_eq!(
            err,
            DiffError::OutOfBounds {
                op: "remove",
                index: 3,
                len: 1
            }
        );
        assert!(apply(&mut list, &[Edit::Move { from: 0, to: 1 }]).is_err());
    }

    fn random_rows(rng: &mut fastrand::Rng) -> Vec<Row> {
        // 内容取值很少，保证大量"内容相同、身份不同"的项
        let mut keys: Vec<u32> = (0..24).filter(|_| rng.bool()).collect();
        rng.shuffle(&mut keys);
        keys.into_iter().map(|k| (k, rng.u8(..3))).collect()
    }

    #[test]
    fn random_scripts_round_trip() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..500 {
            let old = random_rows(&mut rng);
            let new = random_rows(&mut rng);
            let script = run(&old, &new);
            assert_eq!(replay(&old, &script), new, "old={old:?} new={new:?}");

            let mut inserted = std::collections::HashSet::new();
            for edit in &script {
                if let Edit::Insert { item, .. } = edit {
                    assert!(inserted.insert(item.0), "{} inserted twice", item.0);
                }
            }
        }
    }

    #[test]
    fn random_permutations_only_move() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..200 {
            let old = random_rows(&mut rng);
            let mut new = old.clone();
            rng.shuffle(&mut new);
            let script = run(&old, &new);
            assert!(script.iter().all(|e| matches!(e, Edit::Move { .. })));
            assert_eq!(replay(&old, &script), new);
        }
    }

    #[test]
    fn large_reversal_is_one_move_per_item() {
        let old: Vec<Row> = (0..5000).map(|k| (k, 0)).collect();
        let mut new = old.clone();
        new.reverse();
        let script = run(&old, &new);
        assert_eq!(script.len(), old.len() - 1);
        assert_eq!(replay(&old, &script), new);

        let mut shuffled = new.clone();
        fastrand::Rng::with_seed(7).shuffle(&mut shuffled);
        shuffled.truncate(4000);
        shuffled.push((9999, 1));
        let script = run(&old, &shuffled);
        assert_eq!(replay(&old, &script), shuffled);
    }

    #[test]
    fn view_items_diff_by_identity() {
        let old = vec![ViewItem::Section("Installed".to_string())];
        let new = vec![
            ViewItem::Section("Update available".to_string()),
            ViewItem::Section("Installed".to_string()),
        ];
        let script = diff(&old, &new).unwrap();
        assert_eq!(
            script,
            vec![Edit::Insert {
                index: 0,
                item: ViewItem::Section("Update available".to_string()),
            }]
        );
    }
}
