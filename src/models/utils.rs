use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::solver::{Solution, Solver, SolverError, VarId};

/// Declares one variable per key of a sparse index set
pub trait AddVars {
    type Key;

    /// Create a variable for every key with a closure
    fn vars_with<F>(&self, func: F) -> Result<HashMap<Self::Key, VarId>, SolverError>
    where
        F: FnMut(Self::Key) -> Result<VarId, SolverError>;

    /// Binary variables named `base_name_<key>`
    fn binary<S: Solver + ?Sized>(
        &self,
        solver: &mut S,
        base_name: &str,
    ) -> Result<HashMap<Self::Key, VarId>, SolverError>;

    /// Continuous non-negative variables named `base_name_<key>`
    fn cont<S: Solver + ?Sized>(
        &self,
        solver: &mut S,
        base_name: &str,
    ) -> Result<HashMap<Self::Key, VarId>, SolverError>;
}

impl<K> AddVars for [K]
where
    K: Copy + Eq + Hash + Debug,
{
    type Key = K;

    fn vars_with<F>(&self, mut func: F) -> Result<HashMap<K, VarId>, SolverError>
    where
        F: FnMut(K) -> Result<VarId, SolverError>,
    {
        let mut map = HashMap::with_capacity(self.len());
        for &key in self {
            map.insert(key, func(key)?);
        }
        Ok(map)
    }

    fn binary<S: Solver + ?Sized>(
        &self,
        solver: &mut S,
        base_name: &str,
    ) -> Result<HashMap<K, VarId>, SolverError> {
        self.vars_with(|key| solver.add_binary(&format!("{}_{:?}", base_name, key)))
    }

    fn cont<S: Solver + ?Sized>(
        &self,
        solver: &mut S,
        base_name: &str,
    ) -> Result<HashMap<K, VarId>, SolverError> {
        self.vars_with(|key| solver.add_continuous(&format!("{}_{:?}", base_name, key), 0.0))
    }
}

/// Trait that converts solver variables to their solved values
pub trait ConvertVars {
    type Out;
    fn convert(&self, solution: &Solution) -> Self::Out;
}

impl ConvertVars for VarId {
    type Out = f64;

    fn convert(&self, solution: &Solution) -> Self::Out {
        solution.value(*self)
    }
}

impl<K: Copy + Eq + Hash, T: ConvertVars> ConvertVars for HashMap<K, T> {
    type Out = HashMap<K, T::Out>;

    fn convert(&self, solution: &Solution) -> Self::Out {
        self.iter()
            .map(|(&key, var)| (key, var.convert(solution)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::BundledSolver;

    #[test]
    fn one_named_variable_per_key() {
        let mut solver = BundledSolver::new();
        let keys = [(0usize, 1usize), (2, 3)];
        let vars = keys.binary(&mut solver, "x").unwrap();

        assert_eq!(vars.len(), 2);
        assert_eq!(solver.num_vars(), 2);
        assert_eq!(solver.var_name(vars[&(2, 3)]), Some("x_(2, 3)"));
        assert!(solver.is_binary(vars[&(0, 1)]));

        let cont = keys[..1].cont(&mut solver, "q").unwrap();
        assert!(!solver.is_binary(cont[&(0, 1)]));
    }

    #[test]
    fn converts_maps_of_variables() {
        let vars: HashMap<u8, VarId> = [(7, VarId::from(1)), (9, VarId::from(0))]
            .into_iter()
            .collect();
        let solution = Solution::new(0.0, vec![2.5, 4.0]);

        let values = vars.convert(&solution);
        assert_eq!(values[&7], 4.0);
        assert_eq!(values[&9], 2.5);
    }
}
