mod local_mutation_case1;
mod overlapping_mutations_case2;
